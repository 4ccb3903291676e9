use super::{parse_f64, parse_i64};
use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use crate::value::{Entity, SortedSetValue, Value};

fn as_zset(entity: Option<Entity>) -> CResult<SortedSetValue> {
    match entity {
        None => Ok(SortedSetValue::default()),
        Some(e) => match e.value {
            Value::SortedSet(z) => Ok(z),
            _ => Err(Error::WrongType),
        },
    }
}

fn read_zset<R>(db: &Database, key: &[u8], f: impl FnOnce(&SortedSetValue) -> R, default: R) -> CResult<R> {
    match db.get_entity(key)? {
        None => Ok(default),
        Some(e) => match &e.value {
            Value::SortedSet(z) => Ok(f(z)),
            _ => Err(Error::WrongType),
        },
    }
}

fn entries_reply(entries: Vec<(Vec<u8>, Option<f64>)>) -> Reply {
    let mut out = Vec::with_capacity(entries.len() * 2);
    for (member, score) in entries {
        out.push(Reply::bulk(member));
        if let Some(score) = score {
            out.push(Reply::bulk(format!("{score}").into_bytes()));
        }
    }
    Reply::array(out)
}

pub fn zadd(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    if (argv.len() - 2) % 2 != 0 {
        return Err(Error::WrongArity);
    }
    let mut pairs = Vec::new();
    for chunk in argv[2..].chunks(2) {
        pairs.push((parse_f64(&chunk[0])?, chunk[1].clone()));
    }
    let added = db.mutate_entity(&argv[1], |entity| {
        let mut z = as_zset(entity)?;
        let mut added = 0;
        for (score, member) in pairs {
            added += z.add(score, member);
        }
        Ok((Some(Entity::new(Value::SortedSet(z))), added))
    })?;
    Ok(Reply::integer(added))
}

pub fn zrem(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let removed = db.mutate_entity(&argv[1], |entity| match entity {
        None => Ok((None, 0)),
        Some(e) => {
            let mut z = match e.value {
                Value::SortedSet(z) => z,
                _ => return Err(Error::WrongType),
            };
            let mut removed = 0;
            for member in &argv[2..] {
                if z.remove(member) {
                    removed += 1;
                }
            }
            let next = if z.is_empty() { None } else { Some(Entity::new(Value::SortedSet(z))) };
            Ok((next, removed))
        }
    })?;
    Ok(Reply::integer(removed))
}

pub fn zscore(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let score = read_zset(db, &argv[1], |z| z.score(&argv[2]), None)?;
    Ok(score.map(|s| Reply::bulk(format!("{s}").into_bytes())).unwrap_or_else(Reply::nil))
}

pub fn zrank(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let rank = read_zset(db, &argv[1], |z| z.rank(&argv[2]), None)?;
    Ok(rank.map(Reply::integer).unwrap_or_else(Reply::nil))
}

pub fn zrevrank(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let rank = read_zset(db, &argv[1], |z| z.rev_rank(&argv[2]), None)?;
    Ok(rank.map(Reply::integer).unwrap_or_else(Reply::nil))
}

pub fn zcard(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    Ok(Reply::integer(read_zset(db, &argv[1], |z| z.len(), 0)?))
}

fn with_scores_flag(argv: &[Vec<u8>], idx: usize) -> CResult<bool> {
    match argv.get(idx) {
        None => Ok(false),
        Some(tok) if tok.eq_ignore_ascii_case(b"WITHSCORES") => Ok(true),
        Some(_) => Err(Error::Parse("unsupported range option".into())),
    }
}

pub fn zrange(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let start = parse_i64(&argv[2])?;
    let stop = parse_i64(&argv[3])?;
    let with_scores = with_scores_flag(argv, 4)?;
    let entries = read_zset(db, &argv[1], |z| z.range(start, stop, with_scores), Vec::new())?;
    Ok(entries_reply(entries))
}

pub fn zrevrange(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let start = parse_i64(&argv[2])?;
    let stop = parse_i64(&argv[3])?;
    let with_scores = with_scores_flag(argv, 4)?;
    let entries = read_zset(db, &argv[1], |z| z.rev_range(start, stop, with_scores), Vec::new())?;
    Ok(entries_reply(entries))
}

/// `ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]`.
pub fn zrangebyscore(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let min = parse_f64(&argv[2])?;
    let max = parse_f64(&argv[3])?;
    let mut with_scores = false;
    let mut limit: Option<(i64, i64)> = None;
    let mut i = 4;
    while i < argv.len() {
        match String::from_utf8_lossy(&argv[i]).to_ascii_uppercase().as_str() {
            "WITHSCORES" => with_scores = true,
            "LIMIT" => {
                let offset = parse_i64(argv.get(i + 1).ok_or(Error::WrongArity)?)?;
                let count = parse_i64(argv.get(i + 2).ok_or(Error::WrongArity)?)?;
                limit = Some((offset, count));
                i += 2;
            }
            other => return Err(Error::Parse(format!("unsupported ZRANGEBYSCORE option {other}"))),
        }
        i += 1;
    }
    let entries = read_zset(
        db,
        &argv[1],
        |z| match limit {
            Some((offset, count)) => z.range_by_score_with_limit(min, max, offset, count, with_scores, false),
            None => z.range_by_score(min, max, with_scores),
        },
        Vec::new(),
    )?;
    Ok(entries_reply(entries))
}

pub fn zcount(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let min = parse_f64(&argv[2])?;
    let max = parse_f64(&argv[3])?;
    Ok(Reply::integer(read_zset(db, &argv[1], |z| z.count(min, max), 0)?))
}

pub fn zincrby(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let delta = parse_f64(&argv[2])?;
    let member = argv[3].clone();
    let new_score = db.mutate_entity(&argv[1], |entity| {
        let mut z = as_zset(entity)?;
        let next = z.incr_by(delta, member);
        Ok((Some(Entity::new(Value::SortedSet(z))), next))
    })?;
    Ok(Reply::bulk(format!("{new_score}").into_bytes()))
}
