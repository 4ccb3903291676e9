//! C6: a static table built once at process init, mapping an uppercase
//! (lowercased here, case folded at lookup) command name to `{ executor_fn,
//! is_write }`. The write/read flag only feeds side-effect routing (C7); it
//! plays no part in correctness.
//!
//! `SYNC`, `PSYNC`, `SLAVEOF`, and `MONITOR` have no entries here — each
//! needs to take over the client socket itself (a raw bulk transfer, a
//! takeover into replica mode, a takeover into a command firehose), and the
//! engine crate deliberately owns no socket. `server`'s connection loop
//! recognizes those four verbs before ever calling `Database::exec` and
//! handles them directly against `Database::replication`/`register_monitor`.

pub mod admin;
pub mod generic;
pub mod hash;
pub mod list;
pub mod set;
pub mod sorted_set;
pub mod string;
pub mod transaction;

use crate::database::{ConnectionId, Database};
use crate::error::{CResult, Error};
use crate::reply::Reply;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub type Handler = fn(&Database, ConnectionId, &[Vec<u8>]) -> CResult<Reply>;

pub struct Command {
    pub name: &'static str,
    /// Positive: exact argc including the verb. Negative: `-n` means "at
    /// least n".
    pub arity: i64,
    pub is_write: bool,
    pub handler: Handler,
}

pub fn arity_ok(arity: i64, argc: usize) -> bool {
    if arity >= 0 {
        argc as i64 == arity
    } else {
        argc as i64 >= -arity
    }
}

macro_rules! table {
    ($(($name:expr, $arity:expr, $write:expr, $handler:path)),* $(,)?) => {
        [$(($name, Command { name: $name, arity: $arity, is_write: $write, handler: $handler })),*]
    };
}

static REGISTRY: Lazy<HashMap<&'static str, Command>> = Lazy::new(|| {
    HashMap::from(table![
        ("ping", -1, false, admin::ping),
        ("info", -1, false, admin::info),
        ("memory", -2, false, admin::memory),
        ("save", 1, false, admin::save),
        ("bgsave", 1, false, admin::bgsave),
        ("auth", 2, false, admin::auth),
        ("slowlog", -2, false, admin::slowlog),
        ("select", 2, false, admin::select),
        ("type", 2, false, generic::type_of),
        ("del", -2, true, generic::del),
        ("exists", -2, false, generic::exists),
        ("expire", 3, true, generic::expire),
        ("pexpire", 3, true, generic::pexpire),
        ("persist", 2, true, generic::persist),
        ("ttl", 2, false, generic::ttl),
        ("pttl", 2, false, generic::pttl),
        ("move", 3, true, generic::move_key),
        ("get", 2, false, string::get),
        ("set", -3, true, string::set),
        ("setnx", 3, true, string::setnx),
        ("getset", 3, true, string::getset),
        ("append", 3, true, string::append),
        ("strlen", 2, false, string::strlen),
        ("getrange", 4, false, string::getrange),
        ("incr", 2, true, string::incr),
        ("decr", 2, true, string::decr),
        ("incrby", 3, true, string::incrby),
        ("decrby", 3, true, string::decrby),
        ("incrbyfloat", 3, true, string::incrbyfloat),
        ("mset", -3, true, string::mset),
        ("mget", -2, false, string::mget),
        ("hset", -4, true, hash::hset),
        ("hsetnx", 4, true, hash::hsetnx),
        ("hget", 3, false, hash::hget),
        ("hdel", -3, true, hash::hdel),
        ("hexists", 3, false, hash::hexists),
        ("hlen", 2, false, hash::hlen),
        ("hgetall", 2, false, hash::hgetall),
        ("hkeys", 2, false, hash::hkeys),
        ("hvals", 2, false, hash::hvals),
        ("hincrby", 4, true, hash::hincrby),
        ("lpush", -3, true, list::lpush),
        ("rpush", -3, true, list::rpush),
        ("lpop", 2, true, list::lpop),
        ("rpop", 2, true, list::rpop),
        ("llen", 2, false, list::llen),
        ("lindex", 3, false, list::lindex),
        ("lset", 4, true, list::lset),
        ("lrange", 4, false, list::lrange),
        ("ltrim", 4, true, list::ltrim),
        ("lrem", 4, true, list::lrem),
        ("linsert", 5, true, list::linsert),
        ("sadd", -3, true, set::sadd),
        ("srem", -3, true, set::srem),
        ("sismember", 3, false, set::sismember),
        ("smembers", 2, false, set::smembers),
        ("scard", 2, false, set::scard),
        ("spop", 2, true, set::spop),
        ("srandmember", 2, false, set::srandmember),
        ("smove", 4, true, set::smove),
        ("sdiff", -2, false, set::sdiff),
        ("sinter", -2, false, set::sinter),
        ("sunion", -2, false, set::sunion),
        ("zadd", -4, true, sorted_set::zadd),
        ("zrem", -3, true, sorted_set::zrem),
        ("zscore", 3, false, sorted_set::zscore),
        ("zrank", 3, false, sorted_set::zrank),
        ("zrevrank", 3, false, sorted_set::zrevrank),
        ("zcard", 2, false, sorted_set::zcard),
        ("zrange", -4, false, sorted_set::zrange),
        ("zrevrange", -4, false, sorted_set::zrevrange),
        ("zrangebyscore", -4, false, sorted_set::zrangebyscore),
        ("zcount", 4, false, sorted_set::zcount),
        ("zincrby", 4, true, sorted_set::zincrby),
        ("multi", 1, false, transaction::multi),
        ("exec", 1, false, transaction::exec),
        ("discard", 1, false, transaction::discard),
        ("watch", -2, false, transaction::watch),
        ("unwatch", 1, false, transaction::unwatch),
    ])
});

pub fn registry() -> &'static HashMap<&'static str, Command> {
    &REGISTRY
}

pub(crate) fn parse_i64(bytes: &[u8]) -> CResult<i64> {
    std::str::from_utf8(bytes).ok().and_then(|s| s.parse::<i64>().ok()).ok_or(Error::InvalidInteger)
}

pub(crate) fn parse_u64(bytes: &[u8]) -> CResult<u64> {
    std::str::from_utf8(bytes).ok().and_then(|s| s.parse::<u64>().ok()).ok_or(Error::InvalidInteger)
}

pub(crate) fn parse_f64(bytes: &[u8]) -> CResult<f64> {
    std::str::from_utf8(bytes).ok().and_then(|s| s.parse::<f64>().ok()).ok_or(Error::InvalidFloat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_every_verb_lowercased() {
        assert!(registry().contains_key("get"));
        assert!(registry().contains_key("zrangebyscore"));
        assert!(!registry().contains_key("slaveof"));
        assert!(!registry().contains_key("sync"));
    }

    #[test]
    fn arity_ok_handles_exact_and_minimum() {
        assert!(arity_ok(2, 2));
        assert!(!arity_ok(2, 3));
        assert!(arity_ok(-2, 2));
        assert!(arity_ok(-2, 5));
        assert!(!arity_ok(-2, 1));
    }
}
