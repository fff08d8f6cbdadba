use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use log::error;
use rocket::serde::json::serde_json;

use crate::model::{Event, EventHash, EventRecord};

use super::replay::ReplayError;

/// Somewhere committed events are written, in order, as they happen.
pub trait EventSink: Send + Sync {
    /// Durably write one record. An error aborts the commit.
    fn write(&mut self, record: &EventRecord) -> io::Result<()>;
}

/// Writes each record as one line of JSON, flushing after every record. A
/// record that fails part way through is cut back off.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<File> {
    /// Open (or create) a journal file for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

/// Writers that can discard a partially written record.
pub trait Truncate {
    /// Bytes written so far.
    fn written_len(&mut self) -> io::Result<u64>;
    /// Drop everything after the first `len` bytes.
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn written_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl Truncate for Vec<u8> {
    fn written_len(&mut self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.truncate(len as usize);
        Ok(())
    }
}

impl<W> EventSink for JsonLinesSink<W>
where
    W: Write + Truncate + Send + Sync,
{
    fn write(&mut self, record: &EventRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let start = self.writer.written_len()?;
        if let Err(e) = self
            .writer
            .write_all(&line)
            .and_then(|()| self.writer.flush())
        {
            // Never leave a torn line for the next record to be appended to.
            if let Err(undo) = self.writer.truncate_to(start) {
                error!("Failed to remove partial record {}: {undo}", record.sequence);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// The append-only, hash-chained event history of one contract.
///
/// All records are kept in memory for reads; an optional sink persists them.
#[derive(Default)]
pub struct Journal {
    records: Vec<EventRecord>,
    sink: Option<Box<dyn EventSink>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Box<dyn EventSink>) -> Self {
        Self {
            records: Vec::new(),
            sink: Some(sink),
        }
    }

    /// Persist all future records to `sink`. Records already committed are not
    /// re-written, since the sink is expected to already hold them.
    pub fn attach(&mut self, sink: Box<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }

    /// The hash the next record will chain from.
    pub fn head(&self) -> EventHash {
        self.last()
            .map(|record| record.hash)
            .unwrap_or(EventHash::GENESIS)
    }

    pub fn next_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    /// Seal `event` onto the end of the chain. Nothing is kept if the sink fails.
    pub(super) fn append(&mut self, event: Event, timestamp: DateTime<Utc>) -> io::Result<()> {
        let record = EventRecord::seal(self.next_sequence(), timestamp, event, self.head());
        if let Some(sink) = self.sink.as_mut() {
            sink.write(&record)?;
        }
        self.records.push(record);
        Ok(())
    }
}

/// Read a JSON-lines journal. Blank lines are ignored.
pub fn read_records(reader: impl BufRead) -> Result<Vec<EventRecord>, ReplayError> {
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| ReplayError::Format {
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}
