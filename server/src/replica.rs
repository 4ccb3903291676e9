//! The replica side of replication (spec §4.7): `SLAVEOF host port` spawns
//! a supervised background task that connects to the master, issues
//! `SYNC`, loads the returned RDB snapshot, and then replays whatever
//! commands the master streams afterward. `SLAVEOF NO ONE` aborts it.

use crate::resp::FrameReader;
use kv_rs::database::Database;
use kv_rs::persistence;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub struct ReplicaSupervisor {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplicaSupervisor {
    pub fn new() -> Self {
        Self { handle: Mutex::new(None) }
    }

    /// Aborts any link currently running before starting a new one — a
    /// second `SLAVEOF` simply re-points the replica, it never stacks.
    pub fn start(self: &Arc<Self>, db: Arc<Database>, host: String, port: u16) {
        self.stop();
        db.replication.set_master(host.clone(), port);
        let sup = self.clone();
        let task = tokio::spawn(async move {
            loop {
                if !db.replication.master().map(|m| m.host == host && m.port == port).unwrap_or(false) {
                    return;
                }
                if let Err(e) = connect_and_sync(&db, &host, port).await {
                    log::warn!("replication link to {host}:{port} dropped: {e}");
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        });
        *sup.handle.lock().unwrap() = Some(task);
    }

    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Default for ReplicaSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect_and_sync(db: &Arc<Database>, host: &str, port: u16) -> std::io::Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    write_half.write_all(b"SYNC\r\n").await?;

    let header = reader
        .read_line()
        .await?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "master closed before FULLRESYNC"))?;
    let header = String::from_utf8_lossy(&header);
    if !header.starts_with("+FULLRESYNC") {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, format!("unexpected reply: {header}")));
    }
    log::info!("replica: {}", header.trim_start_matches('+'));

    let bulk_header = reader
        .read_line()
        .await?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "master closed before RDB length"))?;
    let bulk_header = String::from_utf8_lossy(&bulk_header);
    let len: usize = bulk_header
        .strip_prefix('$')
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "bad RDB bulk header"))?;
    let rdb_bytes = reader.read_exact(len).await?;
    reader.read_exact(2).await?; // trailing \r\n

    db.flush_all().map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    persistence::load_rdb_from_bytes(db, &rdb_bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    log::info!("replica: loaded {} bytes of RDB snapshot from master", rdb_bytes.len());

    loop {
        match reader.next_command().await? {
            Some(argv) if !argv.is_empty() => {
                if let Err(e) = db.exec_replayed(argv) {
                    log::warn!("replica: propagated command failed: {e}");
                }
            }
            Some(_) => continue,
            None => return Ok(()),
        }
    }
}
