use super::{parse_i64, parse_u64};
use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use crate::value::{Entity, StringValue, Value};
use std::time::Duration;

fn as_string(entity: Option<Entity>) -> CResult<StringValue> {
    match entity {
        None => Ok(StringValue::default()),
        Some(e) => match e.value {
            Value::String(s) => Ok(s),
            _ => Err(Error::WrongType),
        },
    }
}

pub fn get(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match db.get_entity(&argv[1])? {
        None => Ok(Reply::nil()),
        Some(e) => match e.value {
            Value::String(s) => Ok(Reply::bulk(s.get().to_vec())),
            _ => Err(Error::WrongType),
        },
    }
}

/// `SET key value [EX seconds | PX milliseconds] [NX | XX]`. Options beyond
/// these (`KEEPTTL`, `GET`) aren't modeled; unrecognized tokens are a parse
/// error rather than a silent no-op.
pub fn set(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let key = argv[1].clone();
    let value = argv[2].clone();
    let mut ttl: Option<Duration> = None;
    let mut nx = false;
    let mut xx = false;

    let mut i = 3;
    while i < argv.len() {
        match String::from_utf8_lossy(&argv[i]).to_ascii_uppercase().as_str() {
            "EX" => {
                i += 1;
                let secs = argv.get(i).ok_or(Error::WrongArity).and_then(|b| parse_u64(b))?;
                ttl = Some(Duration::from_secs(secs));
            }
            "PX" => {
                i += 1;
                let ms = argv.get(i).ok_or(Error::WrongArity).and_then(|b| parse_u64(b))?;
                ttl = Some(Duration::from_millis(ms));
            }
            "NX" => nx = true,
            "XX" => xx = true,
            other => return Err(Error::Parse(format!("unsupported SET option {other}"))),
        }
        i += 1;
    }

    let exists = db.exists(&key)?;
    if (nx && exists) || (xx && !exists) {
        return Ok(Reply::nil());
    }

    db.put_entity(key.clone(), Entity::new(Value::String(StringValue::new(value))))?;
    match ttl {
        Some(ttl) => {
            db.expire(&key, ttl)?;
        }
        None => {
            db.persist(&key)?;
        }
    }
    Ok(Reply::Ok)
}

pub fn setnx(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    if db.exists(&argv[1])? {
        return Ok(Reply::integer(0));
    }
    db.put_entity(argv[1].clone(), Entity::new(Value::String(StringValue::new(argv[2].clone()))))?;
    Ok(Reply::integer(1))
}

pub fn getset(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let previous = match db.get_entity(&argv[1])? {
        None => Reply::nil(),
        Some(e) => match e.value {
            Value::String(s) => Reply::bulk(s.get().to_vec()),
            _ => return Err(Error::WrongType),
        },
    };
    db.put_entity(argv[1].clone(), Entity::new(Value::String(StringValue::new(argv[2].clone()))))?;
    Ok(previous)
}

pub fn append(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let new_len = db.mutate_entity(&argv[1], |entity| {
        let mut s = as_string(entity)?;
        let len = s.append(&argv[2]);
        Ok((Some(Entity::new(Value::String(s))), len))
    })?;
    Ok(Reply::integer(new_len))
}

pub fn strlen(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match db.get_entity(&argv[1])? {
        None => Ok(Reply::integer(0)),
        Some(e) => match e.value {
            Value::String(s) => Ok(Reply::integer(s.strlen())),
            _ => Err(Error::WrongType),
        },
    }
}

pub fn getrange(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let start = parse_i64(&argv[2])?;
    let end = parse_i64(&argv[3])?;
    match db.get_entity(&argv[1])? {
        None => Ok(Reply::bulk(Vec::new())),
        Some(e) => match e.value {
            Value::String(s) => Ok(Reply::bulk(s.get_range(start, end))),
            _ => Err(Error::WrongType),
        },
    }
}

fn incr_by(db: &Database, key: &[u8], delta: i64) -> CResult<Reply> {
    Ok(Reply::integer(db.atomic_incr(key, delta)?))
}

pub fn incr(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    incr_by(db, &argv[1], 1)
}

pub fn decr(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    incr_by(db, &argv[1], -1)
}

pub fn incrby(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    incr_by(db, &argv[1], parse_i64(&argv[2])?)
}

pub fn decrby(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    incr_by(db, &argv[1], -parse_i64(&argv[2])?)
}

pub fn incrbyfloat(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let delta = super::parse_f64(&argv[2])?;
    let new_bytes = db.mutate_entity(&argv[1], |entity| {
        let mut s = as_string(entity)?;
        let next = s.increment_float(delta)?;
        Ok((Some(Entity::new(Value::String(s))), next))
    })?;
    Ok(Reply::bulk(new_bytes))
}

pub fn mset(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    if (argv.len() - 1) % 2 != 0 {
        return Err(Error::WrongArity);
    }
    for pair in argv[1..].chunks(2) {
        db.put_entity(pair[0].clone(), Entity::new(Value::String(StringValue::new(pair[1].clone()))))?;
    }
    Ok(Reply::Ok)
}

pub fn mget(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let mut out = Vec::with_capacity(argv.len() - 1);
    for key in &argv[1..] {
        let reply = match db.get_entity(key)? {
            Some(e) => match e.value {
                Value::String(s) => Reply::bulk(s.get().to_vec()),
                _ => Reply::nil(),
            },
            None => Reply::nil(),
        };
        out.push(reply);
    }
    Ok(Reply::array(out))
}
