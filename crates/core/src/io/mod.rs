//! File formats exchanged with the outside world
//!
//! - [`dump`]: LAMMPS text dumps for initial structures and trajectory frames
//! - [`event_log`]: one `id time` line per accepted jump
//! - [`init_map`]: JSON snapshot of the initial id to site map

pub mod dump;
pub mod event_log;
pub mod init_map;

pub use dump::{read_dump, read_dump_file, round2, write_dump, write_dump_file, DumpError};
pub use event_log::{read_event_log, read_event_log_file, EventLog, EventSink};
pub use init_map::{read_init_map, write_init_map, InitMap};

use std::fmt;

/// Failure reading or writing the event log or the initial map
#[derive(Debug, Clone, PartialEq)]
pub enum IoError {
    /// Underlying file or stream failure
    Io(String),
    /// A line did not match the expected layout (1-based line number)
    Format { line: usize, message: String },
    /// JSON encoding or decoding failed
    Json(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Io(msg) => write!(f, "I/O error: {msg}"),
            IoError::Format { line, message } => write!(f, "Line {line}: {message}"),
            IoError::Json(msg) => write!(f, "JSON error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json(e.to_string())
    }
}
