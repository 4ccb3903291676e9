//! End-to-end tests against a real TCP socket: bind on an ephemeral port,
//! drive it with a raw `TcpStream`, read back RESP bytes.

use kv_rs::database::{Database, DatabaseOptions};
use kv_server::net;
use kv_server::replica::ReplicaSupervisor;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

async fn spawn_server(opts: DatabaseOptions) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let listener = net::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let db = Database::open(opts).unwrap();
    let repl = Arc::new(ReplicaSupervisor::new());
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = net::serve_on(listener, db, repl, rx).await;
    });
    (addr, tx)
}

async fn roundtrip(stream: &mut TcpStream, command: &[u8]) -> Vec<u8> {
    stream.write_all(command).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.unwrap();
    buf.truncate(n);
    buf
}

#[tokio::test]
async fn ping_and_set_get_roundtrip() {
    let (addr, _shutdown) = spawn_server(DatabaseOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(reply, b"+PONG\r\n");

    let reply = roundtrip(&mut stream, b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n").await;
    assert_eq!(reply, b"+OK\r\n");

    let reply = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\na\r\n").await;
    assert_eq!(reply, b"$1\r\n1\r\n");
}

#[tokio::test]
async fn unknown_key_type_error_is_tagged_wrongtype() {
    let (addr, _shutdown) = spawn_server(DatabaseOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    roundtrip(&mut stream, b"*3\r\n$5\r\nLPUSH\r\n$1\r\nk\r\n$1\r\nv\r\n").await;
    let reply = roundtrip(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert!(reply.starts_with(b"-WRONGTYPE"));
}

#[tokio::test]
async fn requirepass_gates_every_command_but_auth() {
    let mut opts = DatabaseOptions::default();
    opts.requirepass = "hunter2".into();
    let (addr, _shutdown) = spawn_server(opts).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert!(reply.starts_with(b"-NOAUTH"));

    let reply = roundtrip(&mut stream, b"*2\r\n$4\r\nAUTH\r\n$7\r\nhunter2\r\n").await;
    assert_eq!(reply, b"+OK\r\n");

    let reply = roundtrip(&mut stream, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(reply, b"+PONG\r\n");
}

#[tokio::test]
async fn inline_commands_are_accepted() {
    let (addr, _shutdown) = spawn_server(DatabaseOptions::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let reply = roundtrip(&mut stream, b"PING\r\n").await;
    assert_eq!(reply, b"+PONG\r\n");
}

#[tokio::test]
async fn sync_sends_a_fullresync_preamble_with_an_rdb_snapshot() {
    let (addr, _shutdown) = spawn_server(DatabaseOptions::default()).await;
    let mut seed = TcpStream::connect(addr).await.unwrap();
    roundtrip(&mut seed, b"*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n").await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"SYNC\r\n").await.unwrap();
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await.unwrap();
    buf.truncate(n);
    assert!(buf.starts_with(b"+FULLRESYNC "));
    assert!(buf.windows(2).any(|w| w == b"\r\n"));
}
