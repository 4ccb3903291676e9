use super::parse_i64;
use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use crate::value::{Entity, HashValue, Value};

fn as_hash(entity: Option<Entity>) -> CResult<HashValue> {
    match entity {
        None => Ok(HashValue::default()),
        Some(e) => match e.value {
            Value::Hash(h) => Ok(h),
            _ => Err(Error::WrongType),
        },
    }
}

fn read_hash<R>(db: &Database, key: &[u8], f: impl FnOnce(&HashValue) -> R, default: R) -> CResult<R> {
    match db.get_entity(key)? {
        None => Ok(default),
        Some(e) => match &e.value {
            Value::Hash(h) => Ok(f(h)),
            _ => Err(Error::WrongType),
        },
    }
}

/// `HSET key field value [field value ...]`. Returns the count of fields
/// newly created (not counting overwrites), matching modern Redis `HSET`
/// rather than the legacy single-field `HMSET` status reply.
pub fn hset(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    if (argv.len() - 2) % 2 != 0 {
        return Err(Error::WrongArity);
    }
    let created = db.mutate_entity(&argv[1], |entity| {
        let mut h = as_hash(entity)?;
        let mut created = 0;
        for pair in argv[2..].chunks(2) {
            created += h.set(pair[0].clone(), pair[1].clone());
        }
        Ok((Some(Entity::new(Value::Hash(h))), created))
    })?;
    Ok(Reply::integer(created))
}

pub fn hsetnx(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let created = db.mutate_entity(&argv[1], |entity| {
        let mut h = as_hash(entity)?;
        let created = h.set_nx(argv[2].clone(), argv[3].clone());
        Ok((Some(Entity::new(Value::Hash(h))), created))
    })?;
    Ok(Reply::from_bool(created))
}

pub fn hget(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    read_hash(db, &argv[1], |h| h.get(&argv[2]).map(|v| v.to_vec()), None)
        .map(|v| v.map(Reply::bulk).unwrap_or_else(Reply::nil))
}

pub fn hdel(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let removed = db.mutate_entity(&argv[1], |entity| {
        let mut h = as_hash(entity)?;
        let removed = h.remove(&argv[2..]);
        let next = if h.is_empty() { None } else { Some(Entity::new(Value::Hash(h))) };
        Ok((next, removed))
    })?;
    Ok(Reply::integer(removed))
}

pub fn hexists(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    read_hash(db, &argv[1], |h| h.exists(&argv[2]), false).map(Reply::from_bool)
}

pub fn hlen(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    read_hash(db, &argv[1], |h| h.len(), 0).map(Reply::integer)
}

pub fn hgetall(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let pairs = read_hash(db, &argv[1], |h| h.get_all(), Vec::new())?;
    let mut out = Vec::with_capacity(pairs.len() * 2);
    for (k, v) in pairs {
        out.push(Reply::bulk(k));
        out.push(Reply::bulk(v));
    }
    Ok(Reply::array(out))
}

pub fn hkeys(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let keys = read_hash(db, &argv[1], |h| h.keys(), Vec::new())?;
    Ok(Reply::array(keys.into_iter().map(Reply::bulk).collect()))
}

pub fn hvals(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let values = read_hash(db, &argv[1], |h| h.values(), Vec::new())?;
    Ok(Reply::array(values.into_iter().map(Reply::bulk).collect()))
}

pub fn hincrby(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let delta = parse_i64(&argv[3])?;
    let new_value = db.mutate_entity(&argv[1], |entity| {
        let mut h = as_hash(entity)?;
        let next = h.incr_by(&argv[2], delta)?;
        Ok((Some(Entity::new(Value::Hash(h))), next))
    })?;
    Ok(Reply::integer(new_value))
}
