//! Core abstractions: reference data, store contract, tables and errors

pub mod calendar;
pub mod config;
pub mod error;
pub mod log;
pub mod store;
pub mod table;

// Re-export main types for cleaner imports
pub use calendar::{Calendar, MarketContext, Universe};
pub use error::{FetchError, Result};
pub use store::{DocumentKey, FieldDocument, FieldStore, ReferenceSource};
pub use table::{Index, Panel, Series, Table};
