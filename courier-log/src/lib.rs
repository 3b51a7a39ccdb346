//! Append-only binary event log and offline indexer for courier.
//!
//! A log file is an ordered, append-only sequence of timestamped,
//! channel-tagged events with stable byte offsets. The reader supports
//! forward and backward sequential scans plus random access by offset;
//! the indexer derives a queryable strategy → channel → type → offsets
//! artifact from one forward pass.
//!
//! # Key Types
//!
//! - [`LogWriter`] / [`LogReader`] - Exclusive append cursor, movable
//!   read cursor
//! - [`Indexer`] - One-pass scan through pluggable [`IndexStrategy`]
//!   implementations
//! - [`Index`] - The serializable artifact
//! - [`PayloadDecoder`] - Per-channel payload decoding for typed
//!   index buckets
//!
//! # Example
//!
//! ```no_run
//! use courier_log::{Indexer, LogReader, LogWriter};
//!
//! # fn main() -> courier_log::Result<()> {
//! let mut writer = LogWriter::create("flight.clog")?;
//! writer.write_event(0, "GPS", b"fix-1")?;
//! writer.write_event(10, "GPS", b"fix-2")?;
//! writer.sync_all()?;
//!
//! let mut reader = LogReader::open("flight.clog")?;
//! let index = Indexer::new().run(&mut reader)?;
//! assert_eq!(index.offsets("timestamp", "GPS", "raw").map(|o| o.len()), Some(2));
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod event;
pub mod eventlog;
mod format;
pub mod index;

// Re-exports
pub use decode::{DecoderRegistry, JsonDecoder, PayloadDecoder, RAW_TYPE};
pub use error::{Error, Result};
pub use event::{LogEvent, WrittenEvent};
pub use eventlog::{LogReader, LogWriter};
pub use index::{EventRecord, Index, IndexStrategy, Indexer, StrategyIndex, TimestampStrategy};
