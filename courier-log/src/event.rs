//! Log event types.

/// One persisted, timestamped, channel-tagged record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Position in the log's write order, assigned at write time.
    pub event_number: i64,
    /// Event time in microseconds since the Unix epoch.
    pub timestamp: i64,
    /// Channel the event was recorded under.
    pub channel: String,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

/// Receipt for one appended event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenEvent {
    /// The event number assigned to the write.
    pub event_number: i64,
    /// Byte offset of the record start, stable for the file's lifetime
    /// and usable with `LogReader::read_at`.
    pub offset: u64,
}
