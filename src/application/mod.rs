pub mod catalog;
mod dependencies;
pub mod loan;
pub mod user;

pub use dependencies::ServiceDependencies;
