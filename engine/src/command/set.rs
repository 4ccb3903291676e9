use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use crate::value::{Entity, SetValue, Value};

fn as_set(entity: Option<Entity>) -> CResult<SetValue> {
    match entity {
        None => Ok(SetValue::default()),
        Some(e) => match e.value {
            Value::Set(s) => Ok(s),
            _ => Err(Error::WrongType),
        },
    }
}

fn read_set(db: &Database, key: &[u8]) -> CResult<SetValue> {
    match db.get_entity(key)? {
        None => Ok(SetValue::default()),
        Some(e) => match e.value {
            Value::Set(s) => Ok(s),
            _ => Err(Error::WrongType),
        },
    }
}

pub fn sadd(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let added = db.mutate_entity(&argv[1], |entity| {
        let mut s = as_set(entity)?;
        let added = s.add(argv[2..].to_vec());
        Ok((Some(Entity::new(Value::Set(s))), added))
    })?;
    Ok(Reply::integer(added))
}

pub fn srem(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let removed = db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, 0)),
        Some(e) => {
            let mut s = match e.value {
                Value::Set(s) => s,
                _ => return Err(Error::WrongType),
            };
            let removed = s.remove(&argv[2..]);
            let next = if s.is_empty() { None } else { Some(Entity::new(Value::Set(s))) };
            Ok((next, removed))
        }
    })?;
    Ok(Reply::integer(removed))
}

pub fn sismember(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::from_bool(read_set(db, &argv[1])?.is_member(&argv[2])))
}

pub fn smembers(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::array(read_set(db, &argv[1])?.members().into_iter().map(Reply::bulk).collect()))
}

pub fn scard(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(read_set(db, &argv[1])?.len()))
}

pub fn spop(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let popped = db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, None)),
        Some(e) => {
            let mut s = match e.value {
                Value::Set(s) => s,
                _ => return Err(Error::WrongType),
            };
            let popped = s.pop();
            let next = if s.is_empty() { None } else { Some(Entity::new(Value::Set(s))) };
            Ok((next, popped))
        }
    })?;
    Ok(popped.map(Reply::bulk).unwrap_or_else(Reply::nil))
}

pub fn srandmember(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(read_set(db, &argv[1])?.rand_member().map(Reply::bulk).unwrap_or_else(Reply::nil))
}

/// Moves `member` from the set at `src` into the set at `dst`. Two
/// sequential single-key mutations rather than one cross-key atomic step —
/// the spec's atomicity guarantee is single-shard, not cross-key, so this is
/// within contract even though a reader could in principle observe the
/// member briefly absent from both sets.
pub fn smove(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let member = argv[3].clone();
    let removed = db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, false)),
        Some(e) => {
            let mut s = match e.value {
                Value::Set(s) => s,
                _ => return Err(Error::WrongType),
            };
            let removed = s.remove(&[member.clone()]) == 1;
            let next = if s.is_empty() { None } else { Some(Entity::new(Value::Set(s))) };
            Ok((next, removed))
        }
    })?;
    if !removed {
        return Ok(Reply::integer(0));
    }
    db.mutate_entity(&argv[2], |entity| {
        let mut s = as_set(entity)?;
        s.add(vec![argv[3].clone()]);
        Ok((Some(Entity::new(Value::Set(s))), ()))
    })?;
    Ok(Reply::integer(1))
}

fn sets_for(db: &Database, keys: &[Vec<u8>]) -> CResult<Vec<SetValue>> {
    keys.iter().map(|k| read_set(db, k)).collect()
}

pub fn sdiff(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let sets = sets_for(db, &argv[1..])?;
    let (first, rest) = sets.split_first().ok_or(Error::WrongArity)?;
    let rest_refs: Vec<&SetValue> = rest.iter().collect();
    Ok(Reply::array(first.diff(&rest_refs).into_iter().map(Reply::bulk).collect()))
}

pub fn sinter(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let sets = sets_for(db, &argv[1..])?;
    let (first, rest) = sets.split_first().ok_or(Error::WrongArity)?;
    let rest_refs: Vec<&SetValue> = rest.iter().collect();
    Ok(Reply::array(first.intersect(&rest_refs).into_iter().map(Reply::bulk).collect()))
}

pub fn sunion(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let sets = sets_for(db, &argv[1..])?;
    let (first, rest) = sets.split_first().ok_or(Error::WrongArity)?;
    let rest_refs: Vec<&SetValue> = rest.iter().collect();
    Ok(Reply::array(first.union(&rest_refs).into_iter().map(Reply::bulk).collect()))
}
