//! C7 replication: fan-out to connected replicas plus the backlog ring
//! buffer that backs PSYNC. Replica socket ownership belongs to `server`;
//! the engine only ever sees a `ReplicaWriter` capability, which dissolves
//! the dependency the socket would otherwise create the same way the
//! design notes resolve the RDB-loader cycle — pass the capability in at
//! construction (here: at registration time, once per connection) instead
//! of the engine reaching out to own a `TcpStream`.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub const DEFAULT_BACKLOG_CAPACITY: usize = 1024 * 1024;

/// A sink the engine can fire-and-forget propagated command bytes into.
/// `server` is the only crate that constructs a concrete implementation
/// over a `TcpStream`.
pub trait ReplicaWriter: Send {
    fn write_command(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Ring buffer of recently propagated bytes, anchored by the master's
/// monotonic `replication_offset`.
struct Backlog {
    capacity: usize,
    data: VecDeque<u8>,
    /// Absolute offset of `data[0]`.
    start_offset: u64,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self { capacity, data: VecDeque::with_capacity(capacity), start_offset: 0 }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
        if self.data.len() > self.capacity {
            let overflow = self.data.len() - self.capacity;
            self.data.drain(..overflow);
            self.start_offset += overflow as u64;
        }
    }

    /// Returns the bytes from `offset` (inclusive, absolute) onward, or
    /// `None` if `offset` has already fallen out of the window.
    fn slice_from(&self, offset: u64, current_offset: u64) -> Option<Vec<u8>> {
        if offset > current_offset {
            return None;
        }
        if offset < self.start_offset {
            return None;
        }
        let skip = (offset - self.start_offset) as usize;
        if skip > self.data.len() {
            return None;
        }
        Some(self.data.iter().skip(skip).copied().collect())
    }
}

/// Generates a 40-character hex replid, matching Redis's own run-id shape,
/// without pulling in a UUID dependency the teacher's workspace doesn't
/// already have.
fn generate_replid() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Replica-of coordinates, if this instance is currently a replica. Set by
/// `server`'s SLAVEOF handler (the socket connect/SYNC loop is the server
/// crate's responsibility); the engine only records the fact for `INFO`.
#[derive(Debug, Clone)]
pub struct MasterLink {
    pub host: String,
    pub port: u16,
}

pub struct ReplicationState {
    pub replid: String,
    offset: AtomicU64,
    backlog: Mutex<Backlog>,
    replicas: Mutex<Vec<Box<dyn ReplicaWriter>>>,
    master: Mutex<Option<MasterLink>>,
}

impl ReplicationState {
    pub fn new() -> Self {
        Self::with_backlog_capacity(DEFAULT_BACKLOG_CAPACITY)
    }

    pub fn with_backlog_capacity(capacity: usize) -> Self {
        Self {
            replid: generate_replid(),
            offset: AtomicU64::new(0),
            backlog: Mutex::new(Backlog::new(capacity)),
            replicas: Mutex::new(Vec::new()),
            master: Mutex::new(None),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn set_master(&self, host: String, port: u16) {
        *self.master.lock().unwrap() = Some(MasterLink { host, port });
    }

    pub fn clear_master(&self) {
        *self.master.lock().unwrap() = None;
    }

    pub fn master(&self) -> Option<MasterLink> {
        self.master.lock().unwrap().clone()
    }

    pub fn is_replica(&self) -> bool {
        self.master.lock().unwrap().is_some()
    }

    /// Registers a replica connection for subsequent fan-out. Held only
    /// while mutating the list; a snapshot is taken before any I/O so
    /// propagation can never deadlock with a writer.
    pub fn register_replica(&self, writer: Box<dyn ReplicaWriter>) {
        self.replicas.lock().unwrap().push(writer);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.lock().unwrap().len()
    }

    /// Fans a propagated command out to every replica, appends it to the
    /// backlog, and advances the offset — in that order, all after the
    /// mutation itself has already returned its result to the caller.
    /// A replica write failure does not deregister the connection here;
    /// that's the replica's own reader-side cleanup responsibility.
    pub fn propagate(&self, bytes: &[u8]) {
        {
            let mut replicas = self.replicas.lock().unwrap();
            for r in replicas.iter_mut() {
                if let Err(e) = r.write_command(bytes) {
                    log::warn!("replica write failed: {e}");
                }
            }
        }
        let mut backlog = self.backlog.lock().unwrap();
        backlog.append(bytes);
        self.offset.fetch_add(bytes.len() as u64, Ordering::SeqCst);
    }

    /// Resolves a `PSYNC <replid> <offset>` request. Returns `Some(bytes)`
    /// if `offset` is still within the backlog window (caller should reply
    /// `+CONTINUE <new_offset>` then these bytes); `None` means fall back
    /// to a full SYNC.
    pub fn psync(&self, requested_replid: &str, offset: u64) -> Option<Vec<u8>> {
        if requested_replid != self.replid {
            return None;
        }
        let backlog = self.backlog.lock().unwrap();
        backlog.slice_from(offset, self.offset())
    }
}

impl Default for ReplicationState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingWriter {
        seen: std::sync::Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl ReplicaWriter for RecordingWriter {
        fn write_command(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.seen.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    #[test]
    fn propagate_fans_out_and_advances_offset() {
        let repl = ReplicationState::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        repl.register_replica(Box::new(RecordingWriter { seen: seen.clone() }));

        repl.propagate(b"*1\r\n$4\r\nPING\r\n");
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(repl.offset(), "*1\r\n$4\r\nPING\r\n".len() as u64);
    }

    #[test]
    fn psync_returns_none_for_unknown_replid() {
        let repl = ReplicationState::new();
        assert!(repl.psync("not-the-replid", 0).is_none());
    }

    #[test]
    fn psync_returns_trailing_bytes_within_window() {
        let repl = ReplicationState::with_backlog_capacity(1024);
        repl.propagate(b"AAAA");
        repl.propagate(b"BBBB");
        let replid = repl.replid.clone();
        let tail = repl.psync(&replid, 4).unwrap();
        assert_eq!(tail, b"BBBB");
    }

    #[test]
    fn psync_falls_back_to_full_sync_outside_window() {
        let repl = ReplicationState::with_backlog_capacity(4);
        repl.propagate(b"AAAA");
        repl.propagate(b"BBBB");
        let replid = repl.replid.clone();
        assert!(repl.psync(&replid, 0).is_none());
    }
}
