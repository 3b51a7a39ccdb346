//! Append-only event log files: sequential writer and seekable reader.
//!
//! A log file is an ordered sequence of framed records (see `format`).
//! The writer holds the exclusive append cursor and assigns event
//! numbers; the reader owns an independent movable cursor supporting
//! forward step, backward step, and random access by byte offset.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::event::{LogEvent, WrittenEvent};
use crate::format::{self, MAGIC, MAX_CHANNEL_LEN};

const SCAN_CHUNK: usize = 4096;

/// Exclusive append handle on a log file.
pub struct LogWriter {
    file: BufWriter<File>,
    path: PathBuf,
    next_event_number: i64,
    offset: u64,
}

impl LogWriter {
    /// Create (or truncate) a log file and start numbering at zero.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        debug!(path = %path.display(), "created event log");
        Ok(Self {
            file: BufWriter::new(file),
            path,
            next_event_number: 0,
            offset: 0,
        })
    }

    /// Open a log file for appending.
    ///
    /// The next event number continues from the last event already in
    /// the file, keeping numbers strictly increasing across reopen. A
    /// log whose tail is corrupt (not merely truncated) is refused.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        let offset = file.metadata()?.len();

        let next_event_number = if offset == 0 {
            0
        } else {
            let mut reader = LogReader::open(&path)?;
            reader.seek_to_end()?;
            match reader.read_prev()? {
                Some(last) => last.event_number + 1,
                None => 0,
            }
        };

        debug!(
            path = %path.display(),
            offset,
            next_event_number,
            "opened event log for append"
        );
        Ok(Self {
            file: BufWriter::new(file),
            path,
            next_event_number,
            offset,
        })
    }

    /// Append one event, assigning it the next event number.
    ///
    /// The returned offset addresses the record start and stays valid
    /// for the lifetime of the file.
    pub fn write_event(
        &mut self,
        timestamp: i64,
        channel: &str,
        payload: &[u8],
    ) -> Result<WrittenEvent> {
        if channel.is_empty() {
            return Err(Error::InvalidChannel {
                channel: channel.to_string(),
                reason: "channel must not be empty",
            });
        }
        if channel.len() >= MAX_CHANNEL_LEN {
            return Err(Error::InvalidChannel {
                channel: channel.to_string(),
                reason: "channel name too long",
            });
        }

        let event_number = self.next_event_number;
        let offset = self.offset;
        format::write_record(&mut self.file, event_number, timestamp, channel, payload)?;
        self.next_event_number += 1;
        self.offset += format::HEADER_LEN + channel.len() as u64 + payload.len() as u64;
        Ok(WrittenEvent {
            event_number,
            offset,
        })
    }

    /// Flush buffered records to the operating system.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Flush and fsync to durable storage.
    pub fn sync_all(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }

    /// The event number the next write will be assigned.
    #[must_use]
    pub fn next_event_number(&self) -> i64 {
        self.next_event_number
    }

    /// Current end-of-log offset, where the next record will start.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

/// Read handle on a log file with a movable cursor.
///
/// The cursor is a byte position maintained by this handle; every
/// sequential operation seeks before touching the file, so
/// [`read_at`](LogReader::read_at) can interleave freely without
/// disturbing sequential reads.
pub struct LogReader {
    file: File,
    pos: u64,
}

impl LogReader {
    /// Open a log file for reading, cursor at the file origin.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self { file, pos: 0 })
    }

    /// Current cursor position in bytes.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.pos
    }

    /// Move the cursor to the file origin.
    pub fn seek_to_start(&mut self) {
        self.pos = 0;
    }

    /// Move the cursor past the last byte of the file.
    pub fn seek_to_end(&mut self) -> Result<()> {
        self.pos = self.file.metadata()?.len();
        Ok(())
    }

    /// Read the event at the cursor and advance past it.
    ///
    /// Returns `Ok(None)` at end of log, including at a torn trailing
    /// record. A record with bad framing is an [`Error::Corrupt`]; the
    /// cursor stays put so the caller may [`resync`](LogReader::resync)
    /// and continue.
    pub fn read_next(&mut self) -> Result<Option<LogEvent>> {
        self.file.seek(SeekFrom::Start(self.pos))?;
        match format::read_record(&mut self.file, self.pos)? {
            Some(event) => {
                self.pos += format::record_len(&event);
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// Step the cursor back one event and read it.
    ///
    /// Repeated from the tail this yields the exact reverse of
    /// [`read_next`](LogReader::read_next) order. Returns `Ok(None)` at
    /// the beginning of the log. After a successful call the cursor is
    /// at the returned event's record start.
    pub fn read_prev(&mut self) -> Result<Option<LogEvent>> {
        // The cursor is a known record boundary (or the file end): the
        // previous record must end exactly there. Sync-word matches that
        // parse but end elsewhere are payload bytes masquerading as a
        // boundary; a match that parses as a torn record is the true
        // tail, and the boundary moves to its start.
        let mut end_limit = self.pos;
        let mut search_limit = self.pos;
        loop {
            let Some(start) = self.scan_backward(search_limit)? else {
                return Ok(None);
            };
            self.file.seek(SeekFrom::Start(start))?;
            match format::read_record(&mut self.file, start) {
                Ok(Some(event)) if start + format::record_len(&event) == end_limit => {
                    self.pos = start;
                    return Ok(Some(event));
                }
                Ok(Some(_)) | Err(Error::Corrupt { .. }) => {
                    search_limit = start + 3;
                }
                Ok(None) => {
                    end_limit = start;
                    search_limit = start;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Random access: read the exact event starting at `offset` without
    /// moving the sequential cursor.
    pub fn read_at(&mut self, offset: u64) -> Result<LogEvent> {
        self.file.seek(SeekFrom::Start(offset))?;
        match format::read_record(&mut self.file, offset)? {
            Some(event) => Ok(event),
            None => Err(Error::Corrupt {
                offset,
                reason: "record truncated".to_string(),
            }),
        }
    }

    /// After a corrupt record, scan forward to the next sync word.
    ///
    /// Returns `true` when a candidate boundary was found (the cursor
    /// moves there); `false` leaves the cursor at end of log.
    pub fn resync(&mut self) -> Result<bool> {
        match self.scan_forward(self.pos + 1)? {
            Some(start) => {
                self.pos = start;
                Ok(true)
            }
            None => {
                self.seek_to_end()?;
                Ok(false)
            }
        }
    }

    /// Position the cursor so the next [`read_next`](LogReader::read_next)
    /// returns the first event whose timestamp is at or after
    /// `timestamp`.
    ///
    /// Bisects the file by byte offset, assuming timestamps are
    /// non-decreasing in file order; with out-of-order timestamps the
    /// landing point is approximate, as for any offset bisection. Seeks
    /// to end of log when every event is older than `timestamp`.
    pub fn seek_to_timestamp(&mut self, timestamp: i64) -> Result<()> {
        let len = self.file.metadata()?.len();
        let mut lo = 0u64;
        let mut hi = len;

        while hi > lo && hi - lo > SCAN_CHUNK as u64 {
            let mid = lo + (hi - lo) / 2;
            let Some(start) = self.scan_forward(mid)? else {
                hi = mid;
                continue;
            };
            if start >= hi {
                hi = mid;
                continue;
            }
            self.file.seek(SeekFrom::Start(start))?;
            match format::read_record(&mut self.file, start) {
                Ok(Some(event)) if event.timestamp < timestamp => lo = start,
                _ => hi = start.min(mid),
            }
        }

        // Linear refinement over the remaining window.
        self.pos = lo;
        loop {
            let before = self.pos;
            match self.read_next()? {
                Some(event) if event.timestamp >= timestamp => {
                    self.pos = before;
                    return Ok(());
                }
                Some(_) => {}
                None => return Ok(()),
            }
        }
    }

    /// Find the first sync word starting at or after `from`.
    fn scan_forward(&mut self, from: u64) -> Result<Option<u64>> {
        self.file.seek(SeekFrom::Start(from))?;
        let mut window: u32 = 0;
        let mut seen: u64 = 0;
        let mut buf = [0u8; SCAN_CHUNK];
        loop {
            let n = self.file.read(&mut buf)?;
            if n == 0 {
                return Ok(None);
            }
            for &byte in &buf[..n] {
                window = (window << 8) | u32::from(byte);
                seen += 1;
                if seen >= 4 && window == MAGIC {
                    return Ok(Some(from + seen - 4));
                }
            }
        }
    }

    /// Find the last sync word that ends at or before `limit`.
    fn scan_backward(&mut self, limit: u64) -> Result<Option<u64>> {
        let magic = MAGIC.to_be_bytes();
        let mut hi = limit;
        while hi >= 4 {
            let lo = hi.saturating_sub(SCAN_CHUNK as u64);
            let len = (hi - lo) as usize;
            let mut buf = vec![0u8; len];
            self.file.seek(SeekFrom::Start(lo))?;
            self.file.read_exact(&mut buf)?;

            let mut i = len as i64 - 4;
            while i >= 0 {
                let at = i as usize;
                if buf[at..at + 4] == magic {
                    return Ok(Some(lo + at as u64));
                }
                i -= 1;
            }
            if lo == 0 {
                return Ok(None);
            }
            // Overlap the chunk boundary so a straddling sync word is
            // still seen.
            hi = lo + 3;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.clog");
        (dir, path)
    }

    fn write_sample(path: &Path, count: i64) -> Vec<WrittenEvent> {
        let mut writer = LogWriter::create(path).unwrap();
        let receipts = (0..count)
            .map(|i| {
                writer
                    .write_event(i * 10, &format!("CH_{}", i % 3), &[i as u8; 4])
                    .unwrap()
            })
            .collect();
        writer.flush().unwrap();
        receipts
    }

    #[test]
    fn write_assigns_sequential_numbers_and_offsets() {
        let (_dir, path) = temp_log();
        let receipts = write_sample(&path, 5);

        for (i, receipt) in receipts.iter().enumerate() {
            assert_eq!(receipt.event_number, i as i64);
        }
        assert_eq!(receipts[0].offset, 0);
        assert!(receipts.windows(2).all(|w| w[0].offset < w[1].offset));
    }

    #[test]
    fn forward_then_backward_round_trips() {
        let (_dir, path) = temp_log();
        write_sample(&path, 20);

        let mut reader = LogReader::open(&path).unwrap();
        let mut forward = Vec::new();
        while let Some(event) = reader.read_next().unwrap() {
            forward.push(event);
        }
        assert_eq!(forward.len(), 20);

        let mut backward = Vec::new();
        while let Some(event) = reader.read_prev().unwrap() {
            backward.push(event);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn read_prev_then_next_returns_same_event() {
        let (_dir, path) = temp_log();
        write_sample(&path, 3);

        let mut reader = LogReader::open(&path).unwrap();
        reader.seek_to_end().unwrap();
        let prev = reader.read_prev().unwrap().unwrap();
        let next = reader.read_next().unwrap().unwrap();
        assert_eq!(prev, next);
    }

    #[test]
    fn read_at_matches_written_event_and_keeps_cursor() {
        let (_dir, path) = temp_log();
        let receipts = write_sample(&path, 10);

        let mut reader = LogReader::open(&path).unwrap();
        let first = reader.read_next().unwrap().unwrap();

        let fetched = reader.read_at(receipts[7].offset).unwrap();
        assert_eq!(fetched.event_number, 7);

        // Sequential cursor unaffected by the random access.
        let second = reader.read_next().unwrap().unwrap();
        assert_eq!(first.event_number, 0);
        assert_eq!(second.event_number, 1);
    }

    #[test]
    fn offsets_stay_valid_from_a_fresh_handle() {
        let (_dir, path) = temp_log();
        let receipts = write_sample(&path, 10);

        let mut reader = LogReader::open(&path).unwrap();
        for (i, receipt) in receipts.iter().enumerate() {
            let event = reader.read_at(receipt.offset).unwrap();
            assert_eq!(event.event_number, i as i64);
            assert_eq!(event.timestamp, i as i64 * 10);
        }
    }

    #[test]
    fn empty_log_reads_as_eof_and_bof() {
        let (_dir, path) = temp_log();
        LogWriter::create(&path).unwrap().flush().unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_none());
        reader.seek_to_end().unwrap();
        assert!(reader.read_prev().unwrap().is_none());
    }

    #[test]
    fn truncated_tail_reads_as_eof() {
        let (_dir, path) = temp_log();
        write_sample(&path, 3);

        let full_len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_len - 5).unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap().is_some());
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn truncated_tail_is_skipped_reading_backward() {
        let (_dir, path) = temp_log();
        write_sample(&path, 3);

        let full_len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(full_len - 5).unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        reader.seek_to_end().unwrap();
        let last_complete = reader.read_prev().unwrap().unwrap();
        assert_eq!(last_complete.event_number, 1);
    }

    #[test]
    fn corrupt_record_surfaces_then_resyncs() {
        let (_dir, path) = temp_log();
        let receipts = write_sample(&path, 3);

        // Smash the middle record's sync word.
        let mut bytes = std::fs::read(&path).unwrap();
        let target = receipts[1].offset as usize;
        bytes[target] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        assert!(reader.read_next().unwrap().is_some());
        assert!(matches!(
            reader.read_next(),
            Err(Error::Corrupt { .. })
        ));
        assert!(reader.resync().unwrap());
        let recovered = reader.read_next().unwrap().unwrap();
        assert_eq!(recovered.event_number, 2);
    }

    #[test]
    fn append_continues_event_numbering() {
        let (_dir, path) = temp_log();
        write_sample(&path, 4);

        let mut writer = LogWriter::append(&path).unwrap();
        assert_eq!(writer.next_event_number(), 4);
        let receipt = writer.write_event(99, "CH_X", b"tail").unwrap();
        writer.flush().unwrap();
        assert_eq!(receipt.event_number, 4);

        let mut reader = LogReader::open(&path).unwrap();
        reader.seek_to_end().unwrap();
        let last = reader.read_prev().unwrap().unwrap();
        assert_eq!(last.event_number, 4);
        assert_eq!(last.channel, "CH_X");
    }

    #[test]
    fn append_to_missing_file_starts_at_zero() {
        let (_dir, path) = temp_log();
        let mut writer = LogWriter::append(&path).unwrap();
        assert_eq!(writer.next_event_number(), 0);
        writer.write_event(1, "CH", b"x").unwrap();
    }

    #[test]
    fn rejects_unusable_channels() {
        let (_dir, path) = temp_log();
        let mut writer = LogWriter::create(&path).unwrap();

        assert!(matches!(
            writer.write_event(0, "", b"x"),
            Err(Error::InvalidChannel { .. })
        ));
        let long = "C".repeat(MAX_CHANNEL_LEN);
        assert!(matches!(
            writer.write_event(0, &long, b"x"),
            Err(Error::InvalidChannel { .. })
        ));
    }

    #[test]
    fn payload_containing_sync_word_round_trips() {
        let (_dir, path) = temp_log();
        let mut writer = LogWriter::create(&path).unwrap();
        let tricky: Vec<u8> = [0xED, 0xA1, 0xDA, 0x01].repeat(8);
        writer.write_event(5, "RAWBYTES", &tricky).unwrap();
        writer.write_event(6, "RAWBYTES", b"after").unwrap();
        writer.flush().unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        reader.seek_to_end().unwrap();
        let last = reader.read_prev().unwrap().unwrap();
        assert_eq!(last.payload, b"after");
        let first = reader.read_prev().unwrap().unwrap();
        assert_eq!(first.payload, tricky);
        assert!(reader.read_prev().unwrap().is_none());
    }

    #[test]
    fn seek_to_timestamp_lands_on_first_at_or_after() {
        let (_dir, path) = temp_log();
        let mut writer = LogWriter::create(&path).unwrap();
        for i in 0..200i64 {
            writer
                .write_event(i * 100, "T", format!("event-{i}").as_bytes())
                .unwrap();
        }
        writer.flush().unwrap();

        let mut reader = LogReader::open(&path).unwrap();
        reader.seek_to_timestamp(5_000).unwrap();
        let event = reader.read_next().unwrap().unwrap();
        assert_eq!(event.timestamp, 5_000);

        reader.seek_to_timestamp(5_050).unwrap();
        let event = reader.read_next().unwrap().unwrap();
        assert_eq!(event.timestamp, 5_100);

        reader.seek_to_timestamp(1_000_000).unwrap();
        assert!(reader.read_next().unwrap().is_none());

        reader.seek_to_timestamp(-1).unwrap();
        let event = reader.read_next().unwrap().unwrap();
        assert_eq!(event.event_number, 0);
    }
}
