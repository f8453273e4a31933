//! Command handlers and terminal rendering

pub mod query;
pub mod setup;
pub mod ui;

pub use query::{QueryFlags, Rendered, Session, Shape};
