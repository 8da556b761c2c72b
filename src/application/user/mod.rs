mod errors;
mod user_service;

pub use errors::{Result, UserApplicationError};
pub use user_service::{deactivate_user, get_user, register_user};
