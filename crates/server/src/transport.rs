//! Wire framing for the stdio transport: each message is a 4-byte
//! big-endian length prefix followed by that many bytes of UTF-8 JSON.
//! Generic over `Read`/`Write` so tests can exercise it against an
//! in-memory buffer instead of real stdio handles.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use rlm_core::{Error, Result};

/// Largest message body accepted, guarding against a malformed or hostile
/// length prefix causing an unbounded allocation.
const MAX_MESSAGE_BYTES: u32 = 64 * 1024 * 1024;

/// Read one length-prefixed JSON message from `reader`. Returns `Ok(None)`
/// on a clean EOF before any bytes of the next message arrive, so callers
/// can loop until the peer closes the connection.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    let len = match reader.read_u32::<BigEndian>() {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    if len > MAX_MESSAGE_BYTES {
        return Err(Error::Serialization(format!(
            "message of {len} bytes exceeds the {MAX_MESSAGE_BYTES} byte limit"
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    let value = serde_json::from_slice(&buf)?;
    Ok(Some(value))
}

/// Write one length-prefixed JSON message to `writer` and flush it, so the
/// peer sees it immediately rather than sitting in an internal buffer.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    writer.write_u32::<BigEndian>(body.len() as u32)?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_json_value() {
        let mut buf = Vec::new();
        write_message(&mut buf, &json!({"tool": "rlm.session.create"})).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded: serde_json::Value = read_message(&mut cursor).unwrap().unwrap();
        assert_eq!(decoded["tool"], "rlm.session.create");
    }

    #[test]
    fn clean_eof_before_a_message_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let decoded: Option<serde_json::Value> = read_message(&mut cursor).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(MAX_MESSAGE_BYTES + 1).unwrap();
        let mut cursor = Cursor::new(buf);
        let result: Result<Option<serde_json::Value>> = read_message(&mut cursor);
        assert!(result.is_err());
    }

    #[test]
    fn truncated_body_is_an_io_error() {
        let mut buf = Vec::new();
        buf.write_u32::<BigEndian>(10).unwrap();
        buf.extend_from_slice(b"short");
        let mut cursor = Cursor::new(buf);
        let result: Result<Option<serde_json::Value>> = read_message(&mut cursor);
        assert!(result.is_err());
    }
}
