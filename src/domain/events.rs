use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, UserId};

/// イベント：書籍が貸出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLoaned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// イベント：貸出が延長された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanExtended {
    pub loan_id: LoanId,
    pub old_due_date: DateTime<Utc>,
    pub new_due_date: DateTime<Utc>,
    pub extended_at: DateTime<Utc>,
    pub extension_count: u8,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub returned_at: DateTime<Utc>,
    pub was_overdue: bool,
}

/// イベント：貸出が延滞した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBecameOverdue {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
}

/// イベント：貸出中の書籍が紛失した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLost {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub lost_at: DateTime<Utc>,
}

/// ドメインイベント統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    BookLoaned(BookLoaned),
    LoanExtended(LoanExtended),
    BookReturned(BookReturned),
    LoanBecameOverdue(LoanBecameOverdue),
    BookLost(BookLost),
}

impl DomainEvent {
    /// イベント種別の識別子
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BookLoaned(_) => "BookLoaned",
            DomainEvent::LoanExtended(_) => "LoanExtended",
            DomainEvent::BookReturned(_) => "BookReturned",
            DomainEvent::LoanBecameOverdue(_) => "LoanBecameOverdue",
            DomainEvent::BookLost(_) => "BookLost",
        }
    }

    /// イベントの発生時刻
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BookLoaned(e) => e.loaned_at,
            DomainEvent::LoanExtended(e) => e.extended_at,
            DomainEvent::BookReturned(e) => e.returned_at,
            DomainEvent::LoanBecameOverdue(e) => e.detected_at,
            DomainEvent::BookLost(e) => e.lost_at,
        }
    }
}
