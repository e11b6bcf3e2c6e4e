//! Jump event log
//!
//! One line per event, `"{jump_id} {jump_time:.2e}"`. When requested, the
//! first line carries the vacancy id with time zero so the log is
//! self-describing for trajectory reconstruction.

use super::IoError;
use crate::kmc::JumpEvent;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Destination for accepted jump events
pub trait EventSink {
    /// Record one event
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the event cannot be written.
    fn record(&mut self, event: &JumpEvent) -> Result<(), IoError>;

    /// Push buffered events to their destination
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] on write failure.
    fn flush(&mut self) -> Result<(), IoError>;
}

/// In-memory sink
impl EventSink for Vec<JumpEvent> {
    fn record(&mut self, event: &JumpEvent) -> Result<(), IoError> {
        self.push(*event);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        Ok(())
    }
}

/// Buffered text log writer
///
/// Buffered lines are flushed by [`EventLog::finish`] and, as a last resort,
/// when the log is dropped.
pub struct EventLog<W: Write> {
    writer: Option<BufWriter<W>>,
    records: usize,
}

impl EventLog<File> {
    /// Create or truncate a log file
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let file =
            File::create(path).map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
        Ok(Self::new(file))
    }
}

impl<W: Write> EventLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(BufWriter::new(writer)),
            records: 0,
        }
    }

    /// Number of lines written so far
    #[inline]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and hand back the underlying writer
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Io`] if the final flush fails.
    pub fn finish(mut self) -> Result<W, IoError> {
        match self.writer.take() {
            Some(writer) => writer.into_inner().map_err(|e| IoError::Io(e.error().to_string())),
            None => Err(IoError::Io("event log already finished".to_string())),
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<W>, IoError> {
        self.writer
            .as_mut()
            .ok_or_else(|| IoError::Io("event log already finished".to_string()))
    }
}

impl<W: Write> EventSink for EventLog<W> {
    fn record(&mut self, event: &JumpEvent) -> Result<(), IoError> {
        writeln!(self.writer()?, "{} {:.2e}", event.jump_id, event.jump_time)?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.writer()?.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for EventLog<W> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush event log on drop: {e}");
            }
        }
    }
}

/// Parse a log back into events
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns [`IoError::Format`] with the 1-based line number of the first
/// malformed line.
pub fn read_event_log<R: BufRead>(reader: R) -> Result<Vec<JumpEvent>, IoError> {
    let mut events = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let format_error = |message: String| IoError::Format {
            line: n + 1,
            message,
        };

        let mut fields = trimmed.split_whitespace();
        let (Some(id), Some(time), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(format_error(format!("expected 'id time', found '{trimmed}'")));
        };
        // Ids may have been written as floats by other tools
        let jump_id = id
            .parse::<u32>()
            .ok()
            .or_else(|| {
                id.parse::<f64>()
                    .ok()
                    .filter(|v| v.fract() == 0.0 && *v >= 0.0 && *v <= f64::from(u32::MAX))
                    .map(|v| v as u32)
            })
            .ok_or_else(|| format_error(format!("invalid atom id '{id}'")))?;
        let jump_time = time
            .parse::<f64>()
            .map_err(|_| format_error(format!("invalid time '{time}'")))?;

        events.push(JumpEvent { jump_id, jump_time });
    }
    Ok(events)
}

/// Read a log file
///
/// # Errors
///
/// Returns [`IoError::Io`] if the file cannot be opened, otherwise as
/// [`read_event_log`].
pub fn read_event_log_file(path: impl AsRef<Path>) -> Result<Vec<JumpEvent>, IoError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::Io(format!("{}: {e}", path.display())))?;
    read_event_log(BufReader::new(file))
}
