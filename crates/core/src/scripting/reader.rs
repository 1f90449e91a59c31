//! Forward-only reader over the interpreter's list-format report.
//!
//! The report is a sequence of blocks of `Name : Value` lines separated by
//! blank lines, optionally preceded by blank lines:
//!
//! ```text
//!
//! Name                : LEMON
//! AvailableMemoryInMb : 4096
//!
//! Name                : APPLE
//! AvailableMemoryInMb : 1024
//! ```
//!
//! [`TabularReader::read`] advances to the next block and materializes it as
//! a [`Record`]; field accessors read from that current record.

use std::io::BufRead;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::output::OutputStream;
use crate::error::PsError;

/// One parsed block: column name to value, in the order the columns appeared.
///
/// Values are never absent; a blank source value is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing the value in place if the column repeats.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parser position within the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Skipping blank lines before the next record.
    Seeking,
    /// Accumulating `key : value` lines.
    InRecord,
    /// Stream drained or a parse failure occurred.
    Exhausted,
}

/// Cursor over the records in one execution's list-format output.
///
/// Owns the output stream; dropping the reader releases it.
#[derive(Debug)]
pub struct TabularReader {
    stream: OutputStream,
    state: ReaderState,
    current: Option<Record>,
    line: String,
}

impl TabularReader {
    pub fn new(stream: OutputStream) -> Self {
        Self {
            stream,
            state: ReaderState::Seeking,
            current: None,
            line: String::new(),
        }
    }

    /// Parse output that has already been captured as text.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(OutputStream::from_text(text))
    }

    /// Advance to the next record. Returns `false` once the output is drained.
    ///
    /// A line without a colon fails with [`PsError::Parse`] and leaves the
    /// reader exhausted.
    pub fn read(&mut self) -> Result<bool, PsError> {
        self.current = None;
        match self.next_record() {
            Ok(Some(record)) => {
                self.current = Some(record);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                self.state = ReaderState::Exhausted;
                Err(e)
            }
        }
    }

    /// The record under the cursor.
    pub fn current(&self) -> Result<&Record, PsError> {
        self.current.as_ref().ok_or_else(|| {
            PsError::State(
                "read() must return true before accessing the current record".to_string(),
            )
        })
    }

    /// Value of `column` in the current record.
    pub fn get(&self, column: &str) -> Result<&str, PsError> {
        self.current()?
            .get(column)
            .ok_or_else(|| PsError::ColumnNotFound(column.to_string()))
    }

    fn next_record(&mut self) -> Result<Option<Record>, PsError> {
        let mut record = Record::new();
        loop {
            if self.state == ReaderState::Exhausted {
                return Ok(None);
            }

            self.line.clear();
            if self.stream.read_line(&mut self.line)? == 0 {
                let in_record = self.state == ReaderState::InRecord;
                self.state = ReaderState::Exhausted;
                return Ok(in_record.then_some(record));
            }

            let line = self.line.trim_end_matches(['\r', '\n']);
            match (self.state, line.trim().is_empty()) {
                (ReaderState::InRecord, true) => {
                    self.state = ReaderState::Seeking;
                    return Ok(Some(record));
                }
                (_, true) => continue,
                (_, false) => {
                    let (column, value) = split_field(line)?;
                    record.insert(column, value);
                    self.state = ReaderState::InRecord;
                }
            }
        }
    }
}

impl Iterator for TabularReader {
    type Item = Result<Record, PsError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Split a `key : value` line at its first colon, trimming both halves.
fn split_field(line: &str) -> Result<(&str, &str), PsError> {
    let (column, value) = line.split_once(':').ok_or_else(|| {
        PsError::Parse(format!(
            "the command did not produce tabular data: {:?}",
            line.trim()
        ))
    })?;

    let column = column.trim();
    if column.is_empty() {
        return Err(PsError::Parse(format!(
            "field without a column name: {:?}",
            line.trim()
        )));
    }
    Ok((column, value.trim()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
