//! Embeds the engine directly in a process, with no TCP server and no AOF
//! or RDB persistence configured — a scratch database that disappears when
//! the process exits.

use kv_rs::database::{Database, DatabaseOptions};
use kv_rs::reply::Reply;

fn main() {
    println!("Hello, kv-rs!");
    run();
    println!("Bye~");
}

fn run() {
    let db = Database::open(DatabaseOptions::default()).expect("engine should open with default options");

    db.exec(1, vec![b"SET".to_vec(), b"b".to_vec(), vec![0x01]]);
    db.exec(1, vec![b"SET".to_vec(), b"b".to_vec(), vec![0x02]]);

    db.exec(1, vec![b"SET".to_vec(), b"e".to_vec(), vec![0x05]]);
    db.exec(1, vec![b"DEL".to_vec(), b"e".to_vec()]);

    db.exec(1, vec![b"SET".to_vec(), b"c".to_vec(), vec![0x00]]);
    db.exec(1, vec![b"DEL".to_vec(), b"c".to_vec()]);
    db.exec(1, vec![b"SET".to_vec(), b"c".to_vec(), vec![0x03]]);

    db.exec(1, vec![b"SET".to_vec(), b"a".to_vec(), vec![0x01]]);

    db.exec(1, vec![b"DEL".to_vec(), b"f".to_vec()]);

    db.exec(1, vec![b"DEL".to_vec(), b"d".to_vec()]);
    db.exec(1, vec![b"SET".to_vec(), b"d".to_vec(), vec![0x04]]);

    for key in ["a", "b", "c", "d", "e", "f"] {
        let reply = db.exec(1, vec![b"GET".to_vec(), key.as_bytes().to_vec()]);
        println!("{key} -> {reply:?}");
    }

    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"a".to_vec()]), Reply::bulk(vec![0x01]));
    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"b".to_vec()]), Reply::bulk(vec![0x02]));
    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"c".to_vec()]), Reply::bulk(vec![0x03]));
    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"d".to_vec()]), Reply::bulk(vec![0x04]));
    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"e".to_vec()]), Reply::nil());
    assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"f".to_vec()]), Reply::nil());
}
