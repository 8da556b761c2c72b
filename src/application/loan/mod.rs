mod errors;
mod loan_service;
mod overdue_detection;
mod view;

pub use errors::{LoanApplicationError, Result};
pub use loan_service::{
    checkout_book, extend_loan, get_loan_status, list_loans_for_user, list_overdue_loans,
    loan_history, mark_loan_lost, return_loan,
};
pub use overdue_detection::detect_overdue_loans;
pub use view::LoanView;
