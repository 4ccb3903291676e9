//! Administrative commands at the protocol level (spec §6): `PING`,
//! `INFO`, `MEMORY`, `SAVE`, `BGSAVE`, `AUTH`, `SLOWLOG`, `SELECT`.
//! `SYNC`/`PSYNC`/`SLAVEOF`/`MONITOR` are deliberately absent — see the
//! module doc on `command::mod`.

use super::parse_u64;
use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;

pub fn ping(_db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match argv.len() {
        1 => Ok(Reply::Simple("PONG".into())),
        2 => Ok(Reply::bulk(argv[1].clone())),
        _ => Err(Error::WrongArity),
    }
}

pub fn info(db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    let repl = &db.replication;
    let role = if repl.is_replica() { "slave" } else { "master" };
    let mut text = String::new();
    text.push_str("# Server\r\n");
    text.push_str("redis_version:7.0.0-kv-rs\r\n");
    text.push_str("tcp_port:6379\r\n");
    text.push_str("# Memory\r\n");
    text.push_str(&format!("used_memory:{}\r\n", db.memory_counter()));
    text.push_str(&format!("maxmemory:{}\r\n", db.options().maxmemory));
    text.push_str(&format!("maxmemory_policy:{}\r\n", db.options().maxmemory_policy));
    text.push_str("# Replication\r\n");
    text.push_str(&format!("role:{role}\r\n"));
    if let Some(master) = repl.master() {
        text.push_str(&format!("master_host:{}\r\n", master.host));
        text.push_str(&format!("master_port:{}\r\n", master.port));
    }
    text.push_str(&format!("connected_slaves:{}\r\n", repl.replica_count()));
    text.push_str(&format!("master_replid:{}\r\n", repl.replid));
    text.push_str(&format!("master_repl_offset:{}\r\n", repl.offset()));
    Ok(Reply::bulk(text.into_bytes()))
}

pub fn memory(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match String::from_utf8_lossy(&argv[1]).to_ascii_uppercase().as_str() {
        "USAGE" => {
            let key = argv.get(2).ok_or(Error::WrongArity)?;
            match db.get_entity(key)? {
                None => Ok(Reply::nil()),
                Some(e) => Ok(Reply::integer(e.estimated_size)),
            }
        }
        "STATS" => Ok(Reply::array(vec![
            Reply::bulk(b"used_memory".to_vec()),
            Reply::integer(db.memory_counter()),
        ])),
        other => Err(Error::Parse(format!("unsupported MEMORY subcommand {other}"))),
    }
}

pub fn save(db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    db.save_rdb_now()?;
    Ok(Reply::Ok)
}

pub fn bgsave(db: &Database, _conn: ConnectionId, _argv: &[Vec<u8>]) -> CResult<Reply> {
    db.spawn_background_save()?;
    Ok(Reply::Simple("Background saving started".into()))
}

/// The actual `requirepass` gate lives at the connection layer in `server`
/// (spec §9's resolved open question: "the server-level check is the
/// correct one"). This handler only validates the password so the
/// connection can flip its own `authenticated` flag.
pub fn auth(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let required = &db.options().requirepass;
    if required.is_empty() {
        return Err(Error::Value("ERR Client sent AUTH, but no password is set".into()));
    }
    if argv[1] == required.as_bytes() {
        Ok(Reply::Ok)
    } else {
        Err(Error::Value("WRONGPASS invalid username-password pair or user is disabled.".into()))
    }
}

pub fn slowlog(db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    match String::from_utf8_lossy(&argv[1]).to_ascii_uppercase().as_str() {
        "GET" => {
            let count = match argv.get(2) {
                Some(b) => Some(parse_u64(b)? as usize),
                None => None,
            };
            let entries = db.slowlog().get(count);
            let items = entries
                .into_iter()
                .map(|e| {
                    let command = e.command.into_iter().map(Reply::bulk).collect();
                    Reply::array(vec![
                        Reply::integer(e.id),
                        Reply::integer(e.timestamp_secs),
                        Reply::integer(e.duration_micros),
                        Reply::array(command),
                    ])
                })
                .collect();
            Ok(Reply::array(items))
        }
        "LEN" => Ok(Reply::integer(db.slowlog().len() as i64)),
        "RESET" => {
            db.slowlog().reset();
            Ok(Reply::Ok)
        }
        other => Err(Error::Parse(format!("unsupported SLOWLOG subcommand {other}"))),
    }
}

/// Validates the index and returns OK without switching databases — the
/// spec treats multi-DB SELECT as out of scope (§9).
pub fn select(_db: &Database, _conn: ConnectionId, argv: &[Vec<u8>]) -> CResult<Reply> {
    let index = parse_u64(&argv[1])?;
    if index > 15 {
        return Err(Error::Value("ERR DB index is out of range".into()));
    }
    Ok(Reply::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseOptions;

    #[test]
    fn ping_without_argument_replies_pong() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert_eq!(ping(&db, 1, &[b"PING".to_vec()]).unwrap(), Reply::Simple("PONG".into()));
    }

    #[test]
    fn ping_with_argument_echoes_it() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        let reply = ping(&db, 1, &[b"PING".to_vec(), b"hello".to_vec()]).unwrap();
        assert_eq!(reply, Reply::bulk(b"hello".to_vec()));
    }

    #[test]
    fn select_validates_range() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert_eq!(select(&db, 1, &[b"SELECT".to_vec(), b"15".to_vec()]).unwrap(), Reply::Ok);
        assert!(select(&db, 1, &[b"SELECT".to_vec(), b"16".to_vec()]).is_err());
    }

    #[test]
    fn auth_rejects_without_configured_password() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert!(auth(&db, 1, &[b"AUTH".to_vec(), b"x".to_vec()]).is_err());
    }

    #[test]
    fn auth_accepts_matching_password() {
        let mut opts = DatabaseOptions::default();
        opts.requirepass = "hunter2".into();
        let db = Database::open(opts).unwrap();
        assert_eq!(auth(&db, 1, &[b"AUTH".to_vec(), b"hunter2".to_vec()]).unwrap(), Reply::Ok);
        assert!(auth(&db, 1, &[b"AUTH".to_vec(), b"wrong".to_vec()]).is_err());
    }

    #[test]
    fn slowlog_len_and_reset() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert_eq!(slowlog(&db, 1, &[b"SLOWLOG".to_vec(), b"LEN".to_vec()]).unwrap(), Reply::integer(0));
        assert_eq!(slowlog(&db, 1, &[b"SLOWLOG".to_vec(), b"RESET".to_vec()]).unwrap(), Reply::Ok);
    }
}
