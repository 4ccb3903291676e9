//! RESP1 wire plumbing for the TCP server. Decoding reuses
//! `kv_rs::resp_frame` (the same framing an AOF record uses); this module
//! adds the outbound half — turning a `Reply` into bytes — plus a small
//! buffered reader both the client-connection loop and the replica client
//! share for pulling one command at a time off a socket.

use kv_rs::reply::Reply;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Encodes a `Reply` as RESP1. `Error` messages get an `ERR ` prefix unless
/// they already start with an all-uppercase error code (`WRONGTYPE`,
/// `NOAUTH`, `WRONGPASS`, `EXECABORT`, ...), matching real Redis clients'
/// expectation that the first token names the error class.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(reply, &mut out);
    out
}

fn encode_into(reply: &Reply, out: &mut Vec<u8>) {
    match reply {
        Reply::Ok => out.extend_from_slice(b"+OK\r\n"),
        Reply::Queued => out.extend_from_slice(b"+QUEUED\r\n"),
        Reply::Simple(s) => {
            out.push(b'+');
            out.extend_from_slice(s.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Reply::Integer(n) => {
            out.push(b':');
            out.extend_from_slice(n.to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Reply::Bulk(Some(bytes)) => {
            out.push(b'$');
            out.extend_from_slice(bytes.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
        }
        Reply::Array(None) => out.extend_from_slice(b"*-1\r\n"),
        Reply::Array(Some(items)) => {
            out.push(b'*');
            out.extend_from_slice(items.len().to_string().as_bytes());
            out.extend_from_slice(b"\r\n");
            for item in items {
                encode_into(item, out);
            }
        }
        Reply::Error(msg) => {
            out.push(b'-');
            out.extend_from_slice(error_line(msg).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

fn error_line(msg: &str) -> String {
    let first_word = msg.split(' ').next().unwrap_or("");
    let already_tagged = !first_word.is_empty() && first_word.chars().all(|c| c.is_ascii_uppercase());
    if already_tagged {
        msg.to_string()
    } else {
        format!("ERR {msg}")
    }
}

/// Buffers bytes read off an async stream and peels complete RESP command
/// frames or handshake lines off the front, without losing whatever
/// trailing bytes arrive alongside a frame boundary.
pub struct FrameReader<R> {
    stream: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream, buf: Vec::new() }
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = [0u8; 16 * 1024];
        let n = self.stream.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Reads the next RESP command, filling the buffer as needed. Returns
    /// `Ok(None)` on a clean EOF with no partial frame pending.
    pub async fn next_command(&mut self) -> std::io::Result<Option<Vec<Vec<u8>>>> {
        loop {
            match kv_rs::resp_frame::decode_command(&self.buf) {
                Ok(Some((argv, consumed))) => {
                    self.buf.drain(..consumed);
                    return Ok(Some(argv));
                }
                Ok(None) => {
                    if self.fill().await? == 0 {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
            }
        }
    }

    /// Reads one `\r\n`-terminated line (a SYNC handshake reply such as
    /// `+FULLRESYNC <replid> <offset>`), excluding the terminator.
    pub async fn read_line(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(idx) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf[..idx].to_vec();
                self.buf.drain(..idx + 2);
                return Ok(Some(line));
            }
            if self.fill().await? == 0 {
                return Ok(None);
            }
        }
    }

    /// Reads exactly `n` bytes (an RDB bulk payload), filling as needed.
    pub async fn read_exact(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"));
            }
        }
        Ok(self.buf.drain(..n).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_every_reply_shape() {
        assert_eq!(encode_reply(&Reply::Ok), b"+OK\r\n");
        assert_eq!(encode_reply(&Reply::Queued), b"+QUEUED\r\n");
        assert_eq!(encode_reply(&Reply::Integer(42)), b":42\r\n");
        assert_eq!(encode_reply(&Reply::nil()), b"$-1\r\n");
        assert_eq!(encode_reply(&Reply::Array(None)), b"*-1\r\n");
        assert_eq!(encode_reply(&Reply::bulk(b"hi".to_vec())), b"$2\r\nhi\r\n");
        assert_eq!(
            encode_reply(&Reply::array(vec![Reply::integer(1), Reply::integer(2)])),
            b"*2\r\n:1\r\n:2\r\n"
        );
    }

    #[test]
    fn tagged_errors_keep_their_prefix_untouched() {
        assert_eq!(encode_reply(&Reply::Error("WRONGTYPE bad".into())), b"-WRONGTYPE bad\r\n");
        assert_eq!(encode_reply(&Reply::Error("NOAUTH nope".into())), b"-NOAUTH nope\r\n");
    }

    #[test]
    fn untagged_errors_get_an_err_prefix() {
        assert_eq!(encode_reply(&Reply::Error("value is not an integer".into())), b"-ERR value is not an integer\r\n");
    }

    #[tokio::test]
    async fn frame_reader_reads_one_command_at_a_time() {
        let bytes = kv_rs::resp_frame::encode_command(&[b"PING".to_vec()]);
        let mut reader = FrameReader::new(bytes.as_slice());
        let argv = reader.next_command().await.unwrap().unwrap();
        assert_eq!(argv, vec![b"PING".to_vec()]);
        assert!(reader.next_command().await.unwrap().is_none());
    }
}
