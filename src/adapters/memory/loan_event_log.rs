use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::loan_event_log::{LoanEventLog as LoanEventLogTrait, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::poisoned;

/// LoanEventLogのインメモリ実装
///
/// 貸出ごとにリビジョンをキーとして保持する。
pub struct LoanEventLog {
    events: Mutex<HashMap<LoanId, BTreeMap<u32, DomainEvent>>>,
}

impl LoanEventLog {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LoanEventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoanEventLogTrait for LoanEventLog {
    async fn append(&self, loan_id: LoanId, revision: u32, event: DomainEvent) -> Result<()> {
        let mut log = self.events.lock().map_err(poisoned)?;
        let events = log.entry(loan_id).or_default();
        if events.contains_key(&revision) {
            return Err(format!(
                "event for loan {} at revision {} already recorded",
                loan_id.value(),
                revision
            )
            .into());
        }
        events.insert(revision, event);
        Ok(())
    }

    async fn load(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
        let log = self.events.lock().map_err(poisoned)?;
        Ok(log
            .get(&loan_id)
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default())
    }
}
