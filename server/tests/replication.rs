//! A replica connects to a live master, pulls its RDB snapshot, then keeps
//! receiving propagated writes.

use kv_rs::database::{Database, DatabaseOptions};
use kv_rs::reply::Reply;
use kv_server::net;
use kv_server::replica::ReplicaSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

async fn spawn_master(opts: DatabaseOptions) -> (std::net::SocketAddr, Arc<Database>) {
    let listener = net::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let db = Database::open(opts).unwrap();
    let repl = Arc::new(ReplicaSupervisor::new());
    let (_tx, rx) = watch::channel(false);
    let master_db = db.clone();
    tokio::spawn(async move {
        let _ = net::serve_on(listener, master_db, repl, rx).await;
    });
    (addr, db)
}

#[tokio::test]
async fn replica_loads_snapshot_then_streams_live_writes() {
    let (addr, master) = spawn_master(DatabaseOptions::default()).await;
    master.exec(1, vec![b"SET".to_vec(), b"seeded".to_vec(), b"before-sync".to_vec()]);

    let replica_db = Database::open(DatabaseOptions::default()).unwrap();
    let replica_sup = Arc::new(ReplicaSupervisor::new());
    replica_sup.start(replica_db.clone(), "127.0.0.1".to_string(), addr.port());

    wait_until(|| replica_db.exec(1, vec![b"GET".to_vec(), b"seeded".to_vec()]) == Reply::bulk(b"before-sync".to_vec())).await;

    master.exec(1, vec![b"SET".to_vec(), b"live".to_vec(), b"after-sync".to_vec()]);

    wait_until(|| replica_db.exec(1, vec![b"GET".to_vec(), b"live".to_vec()]) == Reply::bulk(b"after-sync".to_vec())).await;
}

#[tokio::test]
async fn slaveof_no_one_stops_the_replication_link() {
    let (addr, master) = spawn_master(DatabaseOptions::default()).await;
    let replica_db = Database::open(DatabaseOptions::default()).unwrap();
    let replica_sup = Arc::new(ReplicaSupervisor::new());
    replica_sup.start(replica_db.clone(), "127.0.0.1".to_string(), addr.port());

    wait_until(|| replica_db.replication.master().is_some()).await;
    replica_sup.stop();
    replica_db.replication.clear_master();
    assert!(replica_db.replication.master().is_none());

    master.exec(1, vec![b"SET".to_vec(), b"after-stop".to_vec(), b"x".to_vec()]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(replica_db.exec(1, vec![b"GET".to_vec(), b"after-stop".to_vec()]), Reply::nil());
}

async fn wait_until(mut pred: impl FnMut() -> bool) {
    for _ in 0..100 {
        if pred() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}
