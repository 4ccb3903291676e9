use super::parse_i64;
use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use crate::value::{Entity, ListValue, Value};

fn as_list(entity: Option<Entity>) -> CResult<ListValue> {
    match entity {
        None => Ok(ListValue::default()),
        Some(e) => match e.value {
            Value::List(l) => Ok(l),
            _ => Err(Error::WrongType),
        },
    }
}

fn read_list<R>(db: &Database, key: &[u8], f: impl FnOnce(&ListValue) -> R, default: R) -> CResult<R> {
    match db.get_entity(key)? {
        None => Ok(default),
        Some(e) => match &e.value {
            Value::List(l) => Ok(f(l)),
            _ => Err(Error::WrongType),
        },
    }
}

fn push(db: &Database, key: &[u8], values: Vec<Vec<u8>>, left: bool) -> CResult<Reply> {
    let new_len = db.mutate_entity(key, |entity| {
        let mut l = as_list(entity)?;
        let len = if left { l.lpush(values) } else { l.rpush(values) };
        Ok((Some(Entity::new(Value::List(l))), len))
    })?;
    Ok(Reply::integer(new_len))
}

pub fn lpush(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    push(db, &argv[1], argv[2..].to_vec(), true)
}

pub fn rpush(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    push(db, &argv[1], argv[2..].to_vec(), false)
}

fn pop(db: &Database, key: &[u8], left: bool) -> CResult<Reply> {
    let popped = db.mutate_entity(key, |entity| {
        let mut l = as_list(entity)?;
        let popped = if left { l.lpop() } else { l.rpop() };
        let next = if l.is_empty() { None } else { Some(Entity::new(Value::List(l))) };
        Ok((next, popped))
    })?;
    Ok(popped.map(Reply::bulk).unwrap_or_else(Reply::nil))
}

pub fn lpop(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    pop(db, &argv[1], true)
}

pub fn rpop(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    pop(db, &argv[1], false)
}

pub fn llen(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    read_list(db, &argv[1], |l| l.len(), 0).map(Reply::integer)
}

pub fn lindex(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let idx = parse_i64(&argv[2])?;
    read_list(db, &argv[1], |l| l.lindex(idx).map(|v| v.to_vec()), None)
        .map(|v| v.map(Reply::bulk).unwrap_or_else(Reply::nil))
}

pub fn lset(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let idx = parse_i64(&argv[2])?;
    db.mutate_entity(&argv[1], |entity| {
        let mut l = match entity {
            None => return Err(Error::NoSuchKey),
            Some(e) => match e.value {
                Value::List(l) => l,
                _ => return Err(Error::WrongType),
            },
        };
        l.lset(idx, argv[3].clone())?;
        Ok((Some(Entity::new(Value::List(l))), ()))
    })?;
    Ok(Reply::Ok)
}

pub fn lrange(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let start = parse_i64(&argv[2])?;
    let stop = parse_i64(&argv[3])?;
    let items = read_list(db, &argv[1], |l| l.lrange(start, stop), Vec::new())?;
    Ok(Reply::array(items.into_iter().map(Reply::bulk).collect()))
}

pub fn ltrim(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let start = parse_i64(&argv[2])?;
    let stop = parse_i64(&argv[3])?;
    db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, ())),
        Some(e) => {
            let mut l = match e.value {
                Value::List(l) => l,
                _ => return Err(Error::WrongType),
            };
            l.ltrim(start, stop);
            let next = if l.is_empty() { None } else { Some(Entity::new(Value::List(l))) };
            Ok((next, ()))
        }
    })?;
    Ok(Reply::Ok)
}

pub fn lrem(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let count = parse_i64(&argv[2])?;
    let removed = db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, 0)),
        Some(e) => {
            let mut l = match e.value {
                Value::List(l) => l,
                _ => return Err(Error::WrongType),
            };
            let removed = l.lrem(count, &argv[3]);
            let next = if l.is_empty() { None } else { Some(Entity::new(Value::List(l))) };
            Ok((next, removed))
        }
    })?;
    Ok(Reply::integer(removed))
}

pub fn linsert(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let before = match String::from_utf8_lossy(&argv[2]).to_ascii_uppercase().as_str() {
        "BEFORE" => true,
        "AFTER" => false,
        _ => return Err(Error::Parse("expected BEFORE or AFTER".into())),
    };
    let result = db.mutate_entity(&argv[1], |entity| {
        let mut l = as_list(entity)?;
        let result = l.linsert(before, &argv[3], argv[4].clone());
        let next = if l.is_empty() { None } else { Some(Entity::new(Value::List(l))) };
        Ok((next, result))
    })?;
    Ok(Reply::integer(result))
}
