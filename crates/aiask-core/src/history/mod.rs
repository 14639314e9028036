//! Append-only record of every question and answer.
//!
//! One file per UTC calendar day, named `YYYY-MM-DD.log`. Entries are never
//! read back, updated or deleted by this crate.

pub mod log;

pub use log::{InteractionLog, LogEntry, ENTRY_SEPARATOR};
