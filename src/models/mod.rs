//! Data models for the library server

pub mod book;
pub mod loan_period;
pub mod principal;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookHolder, BookView};
pub use loan_period::LoanPeriod;
pub use principal::Principal;
pub use transaction::{Transaction, TransactionView};
pub use user::{Role, User};
