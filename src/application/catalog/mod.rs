mod catalog_service;
mod errors;

pub use catalog_service::{adjust_book_quantity, get_book, register_book, search_books};
pub use errors::{CatalogApplicationError, Result};
