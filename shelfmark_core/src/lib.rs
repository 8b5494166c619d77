#![forbid(unsafe_code)]

//! Core domain model and business logic for the Shelfmark library system.
//!
//! This crate provides:
//! - Domain types (book records, copies, members, loans)
//! - The Library aggregate
//! - Circulation (checkout/checkin)
//! - Persistence (loan ledger, CSV archive, library store)

pub mod types;
pub mod error;
pub mod library;
pub mod circulation;
pub mod ledger;
pub mod archive;
pub mod history;
pub mod store;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use library::Library;
pub use circulation::{check_in, check_out};
pub use config::Config;
pub use ledger::{JsonlLedger, LoanSink};
pub use history::load_recent_loans;
