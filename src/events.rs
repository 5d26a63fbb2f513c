//! Decoding of the `go test -json` event stream
//!
//! Each line of the feed is one JSON object. Fields are best-effort: a
//! value that is not a string is dropped from its record instead of
//! failing the parse, so the record survives with fewer fields.

use crate::error::{Result, TriageError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::BufRead;

/// Action tag of a test event, as emitted by `test2json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Run,
    Pause,
    Cont,
    Pass,
    Bench,
    Fail,
    Output,
    Skip,
    /// Missing or unrecognized action; passed through inertly
    Other,
}

impl Action {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "start" => Action::Start,
            "run" => Action::Run,
            "pause" => Action::Pause,
            "cont" => Action::Cont,
            "pass" => Action::Pass,
            "bench" => Action::Bench,
            "fail" => Action::Fail,
            "output" => Action::Output,
            "skip" => Action::Skip,
            _ => Action::Other,
        }
    }
}

/// One record from the diagnostic feed. Absent fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestEvent {
    pub action: String,
    pub test: String,
    pub output: String,
    pub package: String,
}

impl TestEvent {
    /// Build an event from a decoded record, keeping only string-valued fields
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let field = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };

        Self {
            action: field("Action"),
            test: field("Test"),
            output: field("Output"),
            package: field("Package"),
        }
    }

    pub fn action(&self) -> Action {
        Action::parse(&self.action)
    }

    /// A fail marker is a `fail` event that names a specific test.
    /// Package-level `fail` events carry no test identity and are ignored.
    pub fn is_fail_marker(&self) -> bool {
        self.action() == Action::Fail && !self.test.is_empty()
    }
}

/// Decode a line-delimited event stream, preserving feed order.
///
/// Whitespace-only lines are skipped. Any other line that is not a JSON
/// object, including one with invalid UTF-8, aborts the parse with the
/// 1-based line number attached.
pub fn parse_events<R: BufRead>(reader: R) -> Result<Vec<TestEvent>> {
    let mut events = Vec::new();

    for (idx, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(TriageError::ReadFeed)?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let record: Map<String, Value> =
            serde_json::from_slice(&line).map_err(|source| TriageError::MalformedEvent {
                line: idx + 1,
                source,
            })?;
        events.push(TestEvent::from_record(&record));
    }

    Ok(events)
}

/// Convenience wrapper over [`parse_events`] for an in-memory feed
pub fn parse_events_str(feed: &str) -> Result<Vec<TestEvent>> {
    parse_events(feed.as_bytes())
}
