//! On-disk record framing.
//!
//! Each record is a big-endian fixed-width header followed by the
//! variable-length channel and payload bytes:
//!
//! ```text
//! u32 sync word (0xEDA1DA01)
//! i64 event number
//! i64 timestamp (microseconds)
//! u32 channel length
//! u32 payload length
//! [channel bytes][payload bytes]
//! ```
//!
//! The sync word doubles as the sentinel for locating record boundaries
//! when scanning backward. Decoding enforces the channel-length bounds;
//! a clean or mid-record EOF reads as "no record" so a torn trailing
//! write is indistinguishable from end-of-log.

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::event::LogEvent;

/// Record sync word.
pub(crate) const MAGIC: u32 = 0xEDA1_DA01;

/// Fixed header bytes before the channel: sync word + event number +
/// timestamp + two lengths.
pub(crate) const HEADER_LEN: u64 = 4 + 8 + 8 + 4 + 4;

/// Exclusive upper bound on channel length.
pub(crate) const MAX_CHANNEL_LEN: usize = 1000;

/// Total on-disk size of the record holding `event`.
pub(crate) fn record_len(event: &LogEvent) -> u64 {
    HEADER_LEN + event.channel.len() as u64 + event.payload.len() as u64
}

pub(crate) fn write_record<W: Write>(
    writer: &mut W,
    event_number: i64,
    timestamp: i64,
    channel: &str,
    payload: &[u8],
) -> std::io::Result<()> {
    writer.write_all(&MAGIC.to_be_bytes())?;
    writer.write_all(&event_number.to_be_bytes())?;
    writer.write_all(&timestamp.to_be_bytes())?;
    writer.write_all(&(channel.len() as u32).to_be_bytes())?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(channel.as_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read one record from a reader positioned at a record boundary at
/// byte `offset`.
///
/// Returns `Ok(None)` on clean EOF and on EOF inside the record (a torn
/// trailing write). Framing violations surface as [`Error::Corrupt`].
pub(crate) fn read_record<R: Read>(reader: &mut R, offset: u64) -> Result<Option<LogEvent>> {
    let mut word = [0u8; 4];
    if !read_full(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_be_bytes(word) != MAGIC {
        return Err(Error::Corrupt {
            offset,
            reason: "bad sync word".to_string(),
        });
    }

    let mut header = [0u8; 24];
    if !read_full(reader, &mut header)? {
        return Ok(None);
    }
    let event_number = i64::from_be_bytes(header[0..8].try_into().expect("8-byte slice"));
    let timestamp = i64::from_be_bytes(header[8..16].try_into().expect("8-byte slice"));
    let channel_len = u32::from_be_bytes(header[16..20].try_into().expect("4-byte slice")) as usize;
    let payload_len = u32::from_be_bytes(header[20..24].try_into().expect("4-byte slice")) as usize;

    if channel_len == 0 || channel_len >= MAX_CHANNEL_LEN {
        return Err(Error::Corrupt {
            offset,
            reason: format!("invalid channel length {channel_len}"),
        });
    }

    let mut channel = vec![0u8; channel_len];
    if !read_full(reader, &mut channel)? {
        return Ok(None);
    }
    let channel = String::from_utf8(channel).map_err(|_| Error::Corrupt {
        offset,
        reason: "channel is not valid UTF-8".to_string(),
    })?;

    let mut payload = vec![0u8; payload_len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }

    Ok(Some(LogEvent {
        event_number,
        timestamp,
        channel,
        payload,
    }))
}

/// Fill `buf` completely, or report EOF (`false`) whether it struck at
/// the first byte or partway through.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(event_number: i64, timestamp: i64, channel: &str, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_record(&mut buf, event_number, timestamp, channel, payload).unwrap();
        buf
    }

    #[test]
    fn record_round_trips() {
        let buf = encode(3, 1_700_000_000_000_000, "POSE", b"xyz");
        let event = read_record(&mut buf.as_slice(), 0).unwrap().unwrap();

        assert_eq!(event.event_number, 3);
        assert_eq!(event.timestamp, 1_700_000_000_000_000);
        assert_eq!(event.channel, "POSE");
        assert_eq!(event.payload, b"xyz");
        assert_eq!(record_len(&event), buf.len() as u64);
    }

    #[test]
    fn empty_input_is_eof() {
        assert!(read_record(&mut &b""[..], 0).unwrap().is_none());
    }

    #[test]
    fn torn_record_is_eof() {
        let buf = encode(0, 10, "CH", b"payload");
        for cut in 1..buf.len() {
            let truncated = &buf[..cut];
            assert!(
                read_record(&mut &truncated[..], 0).unwrap().is_none(),
                "cut at {cut} should read as EOF"
            );
        }
    }

    #[test]
    fn bad_sync_word_is_corrupt() {
        let mut buf = encode(0, 10, "CH", b"p");
        buf[0] ^= 0xFF;
        let err = read_record(&mut buf.as_slice(), 7).unwrap_err();
        match err {
            Error::Corrupt { offset, reason } => {
                assert_eq!(offset, 7);
                assert!(reason.contains("sync word"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn oversized_channel_length_is_corrupt() {
        let mut buf = encode(0, 10, "CH", b"p");
        // Overwrite the channel-length field with an out-of-bounds value.
        buf[20..24].copy_from_slice(&(MAX_CHANNEL_LEN as u32).to_be_bytes());
        assert!(matches!(
            read_record(&mut buf.as_slice(), 0),
            Err(Error::Corrupt { .. })
        ));
    }

    #[test]
    fn empty_payload_is_valid() {
        let buf = encode(1, 2, "HEARTBEAT", b"");
        let event = read_record(&mut buf.as_slice(), 0).unwrap().unwrap();
        assert!(event.payload.is_empty());
    }
}
