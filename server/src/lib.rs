//! `kv-server`: a RESP1-speaking TCP front end for the `kv-rs` engine.
//!
//! ## Getting started
//!
//! ```text
//! ❯ kv-server -c kv-server.toml
//! [2026-07-27T12:00:00Z] - INFO - [kv_server] listening on 127.0.0.1:6379
//! ```
//!
//! ```text
//! $ redis-cli -p 6379
//! 127.0.0.1:6379> SET order_key xxx
//! OK
//! 127.0.0.1:6379> GET order_key
//! "xxx"
//! ```

pub mod config;
pub mod net;
pub mod replica;
pub mod resp;
pub mod trace;
