pub mod book;
pub mod commands;
pub mod errors;
pub mod events;
pub mod loan;
pub mod policy;
pub mod user;
pub mod value_objects;

pub use book::{Book, BookStatus, NewBook};
pub use errors::*;
pub use events::*;
pub use loan::{Loan, LoanStatus};
pub use policy::{LoanDurations, LoanLimits, LoanPolicy};
pub use user::{NewUser, Role, User};
pub use value_objects::*;
