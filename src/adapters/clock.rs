use crate::ports::Clock;
use chrono::{DateTime, Utc};

/// システム時計
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
