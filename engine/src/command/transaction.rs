//! `MULTI`/`EXEC`/`DISCARD`/`WATCH`/`UNWATCH` registry entries.
//!
//! `Database::exec` recognizes all five verbs and routes them to its own
//! `cmd_multi`/`cmd_exec`/... methods *before* ever consulting the
//! registry (spec §4.5's transaction state machine needs to run whether or
//! not a connection is mid-MULTI, which the normal "queue it if in_multi"
//! branch can't express for these control verbs themselves). These
//! handlers exist only so the registry table type-checks and so
//! `arity_ok`/unknown-command lookups still see the verbs; they are never
//! actually invoked.

use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;

fn unreachable(verb: &str) -> CResult<Reply> {
    Err(Error::Internal(format!("{verb} is handled by Database::exec before dispatch")))
}

pub fn multi(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    unreachable("MULTI")
}

pub fn exec(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    unreachable("EXEC")
}

pub fn discard(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    unreachable("DISCARD")
}

pub fn watch(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    unreachable("WATCH")
}

pub fn unwatch(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    unreachable("UNWATCH")
}
