#![allow(non_camel_case_types)]

//! `kv-rs` is the concurrent execution and storage engine behind the
//! `kv-server` RESP server: a sharded in-memory keyspace, the five Redis
//! value types, active TTL expiration, pluggable eviction, multi-command
//! transactions with WATCH, and the AOF/replication side-effect pipeline
//! that observes every write. The crate owns no socket — `kv-server` is the
//! only thing that speaks RESP and TCP; this crate exposes
//! `Database::exec(conn_id, argv)` as its one entry point.
//!
//! ## Getting started
//!
//! ```rust
//! use kv_rs::database::{Database, DatabaseOptions};
//! use kv_rs::reply::Reply;
//!
//! let db = Database::open(DatabaseOptions::default()).unwrap();
//! db.exec(1, vec![b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()]);
//! assert_eq!(db.exec(1, vec![b"GET".to_vec(), b"a".to_vec()]), Reply::bulk(b"1".to_vec()));
//! ```

pub mod command;
pub mod concurrent_map;
pub mod database;
pub mod error;
pub mod eviction;
pub mod hash;
pub mod persistence;
pub mod replication;
pub mod reply;
pub mod resp_frame;
pub mod slowlog;
pub mod time_wheel;
pub mod value;
