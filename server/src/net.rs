//! The TCP accept loop and per-connection command loop. `SYNC`, `PSYNC`,
//! `SLAVEOF`, and `MONITOR` are intercepted here, before `Database::exec`
//! ever sees them — the engine's command registry deliberately has no
//! entries for them (see `kv_rs::command`'s module doc) because each one
//! needs to take over the connection's socket itself.

use crate::replica::ReplicaSupervisor;
use crate::resp::{encode_reply, FrameReader};
use kv_rs::database::{ConnectionId, Database};
use kv_rs::error::Error;
use kv_rs::persistence;
use kv_rs::reply::Reply;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Binds the listening socket. Split out from `serve` so callers (tests, in
/// particular) can learn the actual bound address before the accept loop
/// starts — handy when the configured port is `0`.
pub async fn bind(bind_addr: &str, port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind((bind_addr, port)).await?;
    log::info!("listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Runs the accept loop until `shutdown` fires. Each accepted connection is
/// handled on its own task; the loop itself never blocks on a slow client.
pub async fn serve(
    db: Arc<Database>,
    repl: Arc<ReplicaSupervisor>,
    bind_addr: &str,
    port: u16,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = bind(bind_addr, port).await?;
    serve_on(listener, db, repl, shutdown).await
}

/// Runs the accept loop against an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    db: Arc<Database>,
    repl: Arc<ReplicaSupervisor>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let db = db.clone();
                let repl = repl.clone();
                tokio::spawn(async move {
                    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
                    log::debug!("connection {conn_id} from {addr}");
                    if let Err(e) = handle_connection(stream, db.clone(), repl, conn_id).await {
                        log::debug!("connection {conn_id} ended: {e}");
                    }
                    db.on_connection_close(conn_id);
                });
            }
            _ = shutdown.changed() => {
                log::info!("shutdown signal received, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

/// A sink for fanned-out bytes (replica propagation or MONITOR output)
/// backed by a channel, so the synchronous `Database::exec` call stack
/// never has to await a socket write. A background task drains the channel
/// into the real connection.
struct ChannelWriter {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl kv_rs::replication::ReplicaWriter for ChannelWriter {
    fn write_command(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "peer channel closed"))
    }
}

/// Hands `write_half` off to a background task and returns a sender that
/// feeds it. Once called, nothing else may write to the socket directly.
fn spawn_writer_pump(mut write_half: OwnedWriteHalf) -> mpsc::UnboundedSender<Vec<u8>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    tokio::spawn(async move {
        while let Some(bytes) = rx.recv().await {
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    });
    tx
}

async fn handle_connection(
    stream: TcpStream,
    db: Arc<Database>,
    repl: Arc<ReplicaSupervisor>,
    conn_id: ConnectionId,
) -> std::io::Result<()> {
    stream.set_nodelay(true).ok();
    let requires_auth = !db.options().requirepass.is_empty();
    let mut authenticated = !requires_auth;

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    loop {
        let argv = match reader.next_command().await? {
            Some(argv) if !argv.is_empty() => argv,
            Some(_) => continue,
            None => return Ok(()),
        };
        let verb = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();

        if !authenticated && verb != "auth" {
            let reply = Reply::Error(Error::NotAuthenticated.to_string());
            write_half.write_all(&encode_reply(&reply)).await?;
            continue;
        }

        match verb.as_str() {
            "sync" => {
                send_fullresync(&mut write_half, &db).await?;
                let tx = spawn_writer_pump(write_half);
                db.replication.register_replica(Box::new(ChannelWriter { tx }));
                drain_until_disconnect(&mut reader).await;
                return Ok(());
            }
            "psync" => {
                let replid = argv.get(1).map(|b| String::from_utf8_lossy(b).to_string()).unwrap_or_default();
                let offset: Option<u64> = argv.get(2).and_then(|b| std::str::from_utf8(b).ok()).and_then(|s| s.parse().ok());
                let continuation = offset.and_then(|o| db.replication.psync(&replid, o));
                match continuation {
                    Some(tail) => {
                        let header = format!("+CONTINUE {}\r\n", db.replication.offset());
                        write_half.write_all(header.as_bytes()).await?;
                        write_half.write_all(&tail).await?;
                    }
                    None => send_fullresync(&mut write_half, &db).await?,
                }
                let tx = spawn_writer_pump(write_half);
                db.replication.register_replica(Box::new(ChannelWriter { tx }));
                drain_until_disconnect(&mut reader).await;
                return Ok(());
            }
            "slaveof" | "replicaof" => {
                let reply = handle_slaveof(&argv, &db, &repl);
                write_half.write_all(&encode_reply(&reply)).await?;
            }
            "monitor" => {
                let tx = spawn_writer_pump(write_half);
                db.register_monitor(Box::new(ChannelWriter { tx: tx.clone() }));
                let _ = tx.send(encode_reply(&Reply::Ok));
                drain_until_disconnect(&mut reader).await;
                return Ok(());
            }
            "auth" => {
                let reply = db.exec(conn_id, argv.clone());
                if reply == Reply::Ok {
                    authenticated = true;
                }
                write_half.write_all(&encode_reply(&reply)).await?;
            }
            _ => {
                let reply = db.exec(conn_id, argv);
                write_half.write_all(&encode_reply(&reply)).await?;
            }
        }
    }
}

/// Writes `+FULLRESYNC <replid> <offset>\r\n$<n>\r\n<n bytes>\r\n` — a full
/// RDB snapshot framed as one RESP bulk string.
async fn send_fullresync(write_half: &mut OwnedWriteHalf, db: &Arc<Database>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    persistence::save_database(db, &mut buf).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let header = format!("+FULLRESYNC {} {}\r\n${}\r\n", db.replication.replid, db.replication.offset(), buf.len());
    write_half.write_all(header.as_bytes()).await?;
    write_half.write_all(&buf).await?;
    write_half.write_all(b"\r\n").await
}

/// Once a connection has become a replica or monitor sink, it no longer
/// issues commands of its own; this just waits for the peer to disconnect
/// so the task can exit and let `on_connection_close` run.
async fn drain_until_disconnect(reader: &mut FrameReader<OwnedReadHalf>) {
    loop {
        match reader.next_command().await {
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return,
        }
    }
}

fn handle_slaveof(argv: &[Vec<u8>], db: &Arc<Database>, repl: &Arc<ReplicaSupervisor>) -> Reply {
    if argv.len() != 3 {
        return Reply::Error(Error::WrongArity.to_string());
    }
    let arg1 = String::from_utf8_lossy(&argv[1]).to_ascii_lowercase();
    let arg2 = String::from_utf8_lossy(&argv[2]).to_ascii_lowercase();
    if arg1 == "no" && arg2 == "one" {
        repl.stop();
        db.replication.clear_master();
        return Reply::Ok;
    }
    let host = String::from_utf8_lossy(&argv[1]).to_string();
    let port: u16 = match std::str::from_utf8(&argv[2]).ok().and_then(|s| s.parse().ok()) {
        Some(p) => p,
        None => return Reply::Error(Error::InvalidInteger.to_string()),
    };
    repl.start(db.clone(), host, port);
    Reply::Ok
}
