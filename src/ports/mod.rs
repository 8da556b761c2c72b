pub mod book_catalog;
pub mod clock;
pub mod inventory_ledger;
pub mod loan_event_log;
pub mod loan_repository;
pub mod user_directory;

pub use book_catalog::BookCatalog;
pub use clock::Clock;
pub use inventory_ledger::{CopyReservation, InventoryLedger, QuantityAdjustment};
pub use loan_event_log::LoanEventLog;
pub use loan_repository::LoanRepository;
pub use user_directory::UserDirectory;
