//! gofix library crate
//!
//! Triage for failing Go tests: reads a `go test -json` feed, works out
//! which tests failed and where, and extracts the source of each failing
//! test together with the declarations it calls.

pub mod bundle;
pub mod config;
pub mod correlate;
pub mod error;
pub mod events;
pub mod index;
pub mod locate;
pub mod pipeline;
pub mod prompt;
pub mod telemetry;

pub use bundle::Bundle;
pub use correlate::{correlate, FailingTest, FailureIndex};
pub use error::{Result, TriageError};
pub use events::{parse_events, TestEvent};
pub use pipeline::Triage;
