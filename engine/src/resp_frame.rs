//! Minimal RESP command framing shared by AOF replay and, via re-export, by
//! `server`'s wire decoder. Only the inbound shape is needed here — arrays
//! of bulk strings — since this is what both an AOF record and a client
//! request look like on the wire. Reply encoding (the five outbound RESP
//! types) is a `server`-side concern; it never has to round-trip through
//! the engine.

use crate::error::{CResult, Error};

/// Encodes a command as a RESP array of bulk strings, the canonical framing
/// for both inbound requests and AOF records.
pub fn encode_command(argv: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", argv.len()).as_bytes());
    for arg in argv {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Parses one command frame from the front of `buf`. Returns `(argv,
/// consumed_bytes)` on success, `None` if `buf` doesn't yet hold a complete
/// frame. Accepts inline commands (a line of space-separated tokens with no
/// leading `*`) as a fallback, matching RESP1's inline-command allowance.
pub fn decode_command(buf: &[u8]) -> CResult<Option<(Vec<Vec<u8>>, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf[0] != b'*' {
        return decode_inline(buf);
    }

    let mut pos = 1;
    let (count, consumed) = match read_line_i64(&buf[pos..])? {
        Some(v) => v,
        None => return Ok(None),
    };
    pos += consumed;
    if count < 0 {
        return Ok(Some((Vec::new(), pos)));
    }

    let mut argv = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if pos >= buf.len() || buf[pos] != b'$' {
            if pos >= buf.len() {
                return Ok(None);
            }
            return Err(Error::Parse("expected bulk string in command array".into()));
        }
        pos += 1;
        let (len, consumed) = match read_line_i64(&buf[pos..])? {
            Some(v) => v,
            None => return Ok(None),
        };
        pos += consumed;
        if len < 0 {
            argv.push(Vec::new());
            continue;
        }
        let len = len as usize;
        if buf.len() < pos + len + 2 {
            return Ok(None);
        }
        argv.push(buf[pos..pos + len].to_vec());
        pos += len + 2;
    }
    Ok(Some((argv, pos)))
}

fn decode_inline(buf: &[u8]) -> CResult<Option<(Vec<Vec<u8>>, usize)>> {
    match buf.iter().position(|&b| b == b'\n') {
        None => Ok(None),
        Some(nl) => {
            let line = &buf[..nl];
            let line = if line.ends_with(b"\r") { &line[..line.len() - 1] } else { line };
            let argv = line.split(|&b| b == b' ').filter(|s| !s.is_empty()).map(|s| s.to_vec()).collect();
            Ok(Some((argv, nl + 1)))
        }
    }
}

fn read_line_i64(buf: &[u8]) -> CResult<Option<(i64, usize)>> {
    match buf.windows(2).position(|w| w == b"\r\n") {
        None => Ok(None),
        Some(idx) => {
            let s = std::str::from_utf8(&buf[..idx]).map_err(|_| Error::Parse("invalid length line".into()))?;
            let n = s.parse::<i64>().map_err(|_| Error::Parse(format!("invalid length: {s}")))?;
            Ok(Some((n, idx + 2)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_array_of_bulk_strings() {
        let argv = vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()];
        let bytes = encode_command(&argv);
        let (decoded, consumed) = decode_command(&bytes).unwrap().unwrap();
        assert_eq!(decoded, argv);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn incomplete_frame_returns_none() {
        let argv = vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()];
        let bytes = encode_command(&argv);
        let truncated = &bytes[..bytes.len() - 2];
        assert!(decode_command(truncated).unwrap().is_none());
    }

    #[test]
    fn inline_command_fallback() {
        let (decoded, consumed) = decode_command(b"PING\r\n").unwrap().unwrap();
        assert_eq!(decoded, vec![b"PING".to_vec()]);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn bulk_string_is_binary_safe() {
        let argv = vec![b"SET".to_vec(), b"a".to_vec(), b"x\r\ny".to_vec()];
        let bytes = encode_command(&argv);
        let (decoded, _) = decode_command(&bytes).unwrap().unwrap();
        assert_eq!(decoded[2], b"x\r\ny".to_vec());
    }
}
