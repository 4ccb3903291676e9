//! Key-space-wide commands that don't belong to any single value type.

use super::parse_u64;
use crate::database::{ConnectionId, Database, TtlStatus};
use crate::error::CResult;
use crate::reply::Reply;
use std::time::Duration;

pub fn type_of(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match db.get_entity(&argv[1])? {
        None => Ok(Reply::Simple("none".into())),
        Some(e) => Ok(Reply::Simple(e.value.type_name().into())),
    }
}

pub fn del(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let mut removed = 0;
    for key in &argv[1..] {
        removed += db.remove(key)?;
    }
    Ok(Reply::integer(removed))
}

pub fn exists(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let mut count = 0;
    for key in &argv[1..] {
        if db.exists(key)? {
            count += 1;
        }
    }
    Ok(Reply::integer(count))
}

pub fn expire(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let secs = parse_u64(&argv[2])?;
    Ok(Reply::integer(db.expire(&argv[1], Duration::from_secs(secs))?))
}

pub fn pexpire(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let ms = parse_u64(&argv[2])?;
    Ok(Reply::integer(db.expire(&argv[1], Duration::from_millis(ms))?))
}

pub fn persist(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(db.persist(&argv[1])?))
}

pub fn ttl(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(match db.ttl(&argv[1])? {
        TtlStatus::Missing => -2,
        TtlStatus::Persistent => -1,
        TtlStatus::Remaining(d) => d.as_secs() as i64,
    }))
}

pub fn pttl(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(match db.ttl(&argv[1])? {
        TtlStatus::Missing => -2,
        TtlStatus::Persistent => -1,
        TtlStatus::Remaining(d) => d.as_millis() as i64,
    }))
}

/// `MOVE key db`: spec §9 decides against real cross-DB moves, so this
/// always reports "key not moved" rather than silently relocating it.
pub fn move_key(_db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(0))
}
