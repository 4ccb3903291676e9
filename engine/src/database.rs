//! C5: the hub. Holds the keyspace (C1), the TTL and version side indices
//! (also C1-shaped), the time wheel (C3), the eviction policy (C4), the
//! slow-log, the per-connection transaction state, and the C7 side-effect
//! sinks (AOF writer, replication state). Config is plumbed in through
//! `DatabaseOptions` at construction — nothing here reads a process-wide
//! global, per the design note against ambient state.

use crate::command;
use crate::concurrent_map::ConcurrentMap;
use crate::error::{CResult, Error};
use crate::eviction::{self, EvictionPolicy};
use crate::persistence::{self, AofOnError, AofWriter};
use crate::replication::ReplicationState;
use crate::reply::Reply;
use crate::resp_frame;
use crate::slowlog::SlowLog;
use crate::time_wheel::TimeWheel;
use crate::value::{Entity, StringValue, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub type ConnectionId = u64;

/// Reserved connection id used only while replaying the AOF at startup;
/// no real client ever holds it, so AOF-replayed commands can't collide
/// with live transaction state.
const REPLAY_CONNECTION_ID: ConnectionId = u64::MAX;

#[derive(Debug, Clone, Default)]
pub struct TransactionState {
    pub in_multi: bool,
    pub queued: Vec<Vec<Vec<u8>>>,
    pub aborted: bool,
    pub watched: HashMap<Vec<u8>, u64>,
}

pub enum TtlStatus {
    /// Key absent (`-2` at the protocol level).
    Missing,
    /// Key present without an expiration (`-1`).
    Persistent,
    Remaining(Duration),
}

#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub shard_count: usize,
    pub maxmemory: i64,
    pub maxmemory_policy: String,
    pub tick_ms: u64,
    pub wheel_buckets: usize,
    pub aof_enabled: bool,
    pub aof_path: Option<PathBuf>,
    pub aof_on_error: AofOnError,
    pub rdb_path: Option<PathBuf>,
    pub requirepass: String,
    pub backlog_capacity: usize,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            shard_count: 16,
            maxmemory: 0,
            maxmemory_policy: "noeviction".to_string(),
            tick_ms: 10,
            wheel_buckets: 1024,
            aof_enabled: false,
            aof_path: None,
            aof_on_error: AofOnError::Log,
            rdb_path: None,
            requirepass: String::new(),
            backlog_capacity: crate::replication::DEFAULT_BACKLOG_CAPACITY,
        }
    }
}

pub struct Database {
    keyspace: ConcurrentMap<Entity>,
    ttl_index: ConcurrentMap<Instant>,
    version_index: ConcurrentMap<u64>,
    memory_counter: AtomicI64,
    wheel: TimeWheel,
    eviction: Option<Box<dyn EvictionPolicy>>,
    slowlog: SlowLog,
    transactions: Mutex<HashMap<ConnectionId, TransactionState>>,
    aof: Mutex<Option<AofWriter>>,
    pub replication: ReplicationState,
    monitors: Mutex<Vec<Box<dyn crate::replication::ReplicaWriter>>>,
    background_save: AtomicBool,
    options: DatabaseOptions,
    /// Set once, right after construction, so `BGSAVE` can hand a strong
    /// reference to its worker thread without the handler signature
    /// (`&Database`) having to carry one around.
    self_ref: Mutex<std::sync::Weak<Database>>,
}

impl Database {
    /// Builds a database, recovers from `rdb_path`/`aof_path` if configured
    /// (RDB first, then AOF replay — the documented crash-recovery order),
    /// and starts the time-wheel worker. The worker's expiry callback holds
    /// only a `Weak` reference so the database can still drop normally.
    pub fn open(options: DatabaseOptions) -> CResult<Arc<Database>> {
        let eviction = eviction::policy_from_config(&options.maxmemory_policy);
        let shard_count = options.shard_count;
        let tick_ms = options.tick_ms;
        let wheel_buckets = options.wheel_buckets;

        let db = Arc::new(Database {
            keyspace: ConcurrentMap::new(shard_count),
            ttl_index: ConcurrentMap::new(shard_count),
            version_index: ConcurrentMap::new(shard_count),
            memory_counter: AtomicI64::new(0),
            wheel: TimeWheel::new(tick_ms, wheel_buckets),
            eviction,
            slowlog: SlowLog::new(),
            transactions: Mutex::new(HashMap::new()),
            aof: Mutex::new(None),
            replication: ReplicationState::with_backlog_capacity(options.backlog_capacity),
            monitors: Mutex::new(Vec::new()),
            background_save: AtomicBool::new(false),
            options,
            self_ref: Mutex::new(std::sync::Weak::new()),
        });
        *db.self_ref.lock().unwrap() = Arc::downgrade(&db);

        if let Some(rdb_path) = db.options.rdb_path.clone() {
            persistence::load_rdb_from_file(&db, &rdb_path)?;
        }
        if let Some(aof_path) = db.options.aof_path.clone() {
            persistence::replay_aof(&aof_path, &db)?;
            if db.options.aof_enabled {
                let writer = AofWriter::open(&aof_path, db.options.aof_on_error)?;
                *db.aof.lock().unwrap() = Some(writer);
            }
        }

        let weak = Arc::downgrade(&db);
        db.wheel.start(move |key| {
            if let Some(db) = weak.upgrade() {
                let _ = db.remove(key);
            }
        });

        Ok(db)
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn slowlog(&self) -> &SlowLog {
        &self.slowlog
    }

    pub fn memory_counter(&self) -> i64 {
        self.memory_counter.load(Ordering::SeqCst)
    }

    pub fn register_monitor(&self, writer: Box<dyn crate::replication::ReplicaWriter>) {
        self.monitors.lock().unwrap().push(writer);
    }

    pub fn begin_background_save(&self) -> CResult<()> {
        if self.background_save.swap(true, Ordering::SeqCst) {
            return Err(Error::BackgroundSaveInProgress);
        }
        Ok(())
    }

    pub fn end_background_save(&self) {
        self.background_save.store(false, Ordering::SeqCst);
    }

    /// `BGSAVE`: marks a save in progress (rejecting a second overlapping
    /// request), then does the actual write on a detached worker thread so
    /// the calling connection's task isn't blocked on file I/O.
    pub fn spawn_background_save(&self) -> CResult<()> {
        self.begin_background_save()?;
        let weak = self.self_ref.lock().unwrap().clone();
        std::thread::spawn(move || {
            if let Some(db) = weak.upgrade() {
                if let Err(e) = db.save_rdb_now() {
                    log::error!("BGSAVE failed: {e}");
                }
                db.end_background_save();
            }
        });
        Ok(())
    }

    /// Drops every live key. Used by the replica side of a full SYNC to
    /// clear local state before loading the master's RDB snapshot.
    pub fn flush_all(&self) -> CResult<()> {
        let keys = self.keyspace.keys()?;
        for key in keys {
            self.remove(&key)?;
        }
        Ok(())
    }

    // ---- keyspace primitives (spec §4.5) ----

    fn check_and_expire(&self, key: &[u8]) -> CResult<bool> {
        if let Some(deadline) = self.ttl_index.get(key)? {
            if Instant::now() >= deadline {
                self.remove(key)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lazy expiration: if the TTL index says `key` is past due, remove it
    /// and report absence; otherwise return the live entity and notify the
    /// eviction policy of an access.
    pub fn get_entity(&self, key: &[u8]) -> CResult<Option<Entity>> {
        self.check_and_expire(key)?;
        let entity = self.keyspace.get(key)?;
        if entity.is_some() {
            if let Some(policy) = &self.eviction {
                policy.record_access(key);
            }
        }
        Ok(entity)
    }

    /// Whole-entity replace used by commands that always install a fresh
    /// value regardless of what was there before (`SET`, full overwrites).
    /// Returns 1 if the key was absent beforehand.
    pub fn put_entity(&self, key: Vec<u8>, entity: Entity) -> CResult<i64> {
        let new_size = entity.estimated_size;
        let existing_size = self.keyspace.get(&key)?.map(|e| e.estimated_size);
        let result = self.keyspace.put(key.clone(), entity)?;
        match existing_size {
            Some(old) => {
                self.memory_counter.fetch_add(new_size - old, Ordering::SeqCst);
            }
            None => {
                self.memory_counter.fetch_add(new_size, Ordering::SeqCst);
            }
        }
        self.bump_version(&key)?;
        if let Some(policy) = &self.eviction {
            if existing_size.is_some() {
                policy.record_update(&key);
            } else {
                policy.record_access(&key);
            }
        }
        self.run_eviction_loop()?;
        Ok(result)
    }

    /// The sole read-modify-write primitive for value-type mutations:
    /// shard lock taken once, `f` decides both the new entity and the
    /// value handed back to the caller. Handles memory-counter, version,
    /// TTL/time-wheel, and eviction-policy bookkeeping around whatever `f`
    /// decides, including the entity-deleting case (e.g. `LPOP` draining
    /// the last element).
    pub fn mutate_entity<F, R>(&self, key: &[u8], f: F) -> CResult<R>
    where
        F: FnOnce(Option<Entity>) -> CResult<(Option<Entity>, R)>,
    {
        let old_size = self.keyspace.get(key)?.map(|e| e.estimated_size).unwrap_or(0);
        let existed = old_size != 0;
        let (new_size, ret) = self.keyspace.atomic_update(key, |entity| {
            let (new_entity, ret) = f(entity)?;
            let size = new_entity.as_ref().map(|e| e.estimated_size);
            Ok((new_entity, (size, ret)))
        })?;

        match new_size {
            Some(new_size) => {
                self.memory_counter.fetch_add(new_size - old_size, Ordering::SeqCst);
                self.bump_version(key)?;
                if let Some(policy) = &self.eviction {
                    if existed {
                        policy.record_update(key);
                    } else {
                        policy.record_access(key);
                    }
                }
            }
            None => {
                if existed {
                    self.memory_counter.fetch_sub(old_size, Ordering::SeqCst);
                    self.ttl_index.remove(key)?;
                    self.wheel.remove(key);
                    self.bump_version(key)?;
                    self.version_index.remove(key)?;
                    if let Some(policy) = &self.eviction {
                        policy.record_delete(key);
                    }
                }
            }
        }
        self.run_eviction_loop()?;
        Ok(ret)
    }

    /// Pre-reads size without triggering lazy expiry (to avoid recursion),
    /// drops the key from every side table, bumping its version *before*
    /// dropping the version-index entry so a concurrent WATCH observes the
    /// mutation. A re-created key starts fresh at version 1.
    pub fn remove(&self, key: &[u8]) -> CResult<i64> {
        let size = self.keyspace.get(key)?.map(|e| e.estimated_size).unwrap_or(0);
        let result = self.keyspace.remove(key)?;
        if result == 1 {
            self.ttl_index.remove(key)?;
            self.wheel.remove(key);
            self.bump_version(key)?;
            self.version_index.remove(key)?;
            self.memory_counter.fetch_sub(size, Ordering::SeqCst);
            if let Some(policy) = &self.eviction {
                policy.record_delete(key);
            }
        }
        Ok(result)
    }

    pub fn exists(&self, key: &[u8]) -> CResult<bool> {
        Ok(self.get_entity(key)?.is_some())
    }

    pub fn expire(&self, key: &[u8], ttl: Duration) -> CResult<i64> {
        if self.check_and_expire(key)? {
            return Ok(0);
        }
        if self.keyspace.get(key)?.is_none() {
            return Ok(0);
        }
        let deadline = Instant::now() + ttl;
        self.ttl_index.put(key.to_vec(), deadline)?;
        self.wheel.add(key.to_vec(), ttl);
        if let Some(policy) = &self.eviction {
            policy.record_expire(key, deadline);
        }
        self.bump_version(key)?;
        Ok(1)
    }

    pub fn persist(&self, key: &[u8]) -> CResult<i64> {
        if self.check_and_expire(key)? {
            return Ok(0);
        }
        if self.ttl_index.get(key)?.is_some() {
            self.ttl_index.remove(key)?;
            self.wheel.remove(key);
            self.bump_version(key)?;
            Ok(1)
        } else {
            Ok(0)
        }
    }

    pub fn ttl(&self, key: &[u8]) -> CResult<TtlStatus> {
        if self.check_and_expire(key)? {
            return Ok(TtlStatus::Missing);
        }
        if self.keyspace.get(key)?.is_none() {
            return Ok(TtlStatus::Missing);
        }
        match self.ttl_index.get(key)? {
            None => Ok(TtlStatus::Persistent),
            Some(deadline) => {
                let now = Instant::now();
                if deadline <= now {
                    self.remove(key)?;
                    Ok(TtlStatus::Missing)
                } else {
                    Ok(TtlStatus::Remaining(deadline - now))
                }
            }
        }
    }

    /// Routed through `mutate_entity` so a concurrent competing `INCR` on
    /// the same key linearizes.
    pub fn atomic_incr(&self, key: &[u8], delta: i64) -> CResult<i64> {
        self.check_and_expire(key)?;
        self.mutate_entity(key, |entity| {
            let mut e = match entity {
                Some(e) => {
                    if !matches!(e.value, Value::String(_)) {
                        return Err(Error::WrongType);
                    }
                    e
                }
                None => Entity::new(Value::String(StringValue::new(Vec::new()))),
            };
            let new_value = match &mut e.value {
                Value::String(s) => s.increment(delta)?,
                _ => unreachable!(),
            };
            e.refresh_size();
            Ok((Some(e), new_value))
        })
    }

    fn bump_version(&self, key: &[u8]) -> CResult<u64> {
        self.version_index.atomic_update(key, |cur| {
            let next = cur.unwrap_or(0) + 1;
            Ok((Some(next), next))
        })
    }

    pub fn version_of(&self, key: &[u8]) -> CResult<u64> {
        Ok(self.version_index.get(key)?.unwrap_or(0))
    }

    fn run_eviction_loop(&self) -> CResult<()> {
        let Some(policy) = &self.eviction else {
            return Ok(());
        };
        if self.options.maxmemory <= 0 {
            return Ok(());
        }
        loop {
            if self.memory_counter.load(Ordering::SeqCst) <= self.options.maxmemory {
                break;
            }
            let candidates = policy.evict(10);
            if candidates.is_empty() {
                break;
            }
            for key in candidates {
                self.remove(&key)?;
            }
        }
        Ok(())
    }

    // ---- persistence helpers (C7, consumed by `persistence`) ----

    pub fn for_each_entity<F>(&self, mut f: F) -> CResult<()>
    where
        F: FnMut(&[u8], &Entity, Option<u64>),
    {
        self.keyspace.for_each(|key, entity| {
            match self.ttl_index.get(key) {
                Ok(Some(deadline)) => {
                    let now = Instant::now();
                    if deadline <= now {
                        return true;
                    }
                    f(key, entity, Some((deadline - now).as_millis() as u64));
                }
                _ => f(key, entity, None),
            }
            true
        })
    }

    /// Installs an entity loaded from an RDB record, bypassing the normal
    /// write bookkeeping (version bump, eviction notification) that only
    /// applies to live client writes.
    pub fn restore_entity(&self, key: Vec<u8>, entity: Entity, ttl_millis_remaining: Option<u64>) -> CResult<()> {
        let size = entity.estimated_size;
        self.keyspace.put(key.clone(), entity)?;
        self.memory_counter.fetch_add(size, Ordering::SeqCst);
        if let Some(ms) = ttl_millis_remaining {
            let ttl = Duration::from_millis(ms);
            let deadline = Instant::now() + ttl;
            self.ttl_index.put(key.clone(), deadline)?;
            self.wheel.add(key.clone(), ttl);
            if let Some(policy) = &self.eviction {
                policy.record_expire(&key, deadline);
            }
        }
        Ok(())
    }

    /// Re-executes one AOF-recorded command without re-appending to the AOF
    /// or re-propagating to replicas.
    pub fn exec_replayed(&self, argv: Vec<Vec<u8>>) -> CResult<()> {
        if argv.is_empty() {
            return Ok(());
        }
        let verb = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();
        if let Some(cmd) = command::registry().get(verb.as_str()) {
            (cmd.handler)(self, REPLAY_CONNECTION_ID, &argv)?;
        }
        Ok(())
    }

    pub fn save_rdb_now(&self) -> CResult<()> {
        let Some(path) = self.options.rdb_path.clone() else {
            return Err(Error::RdbIoError("dbfilename not configured".into()));
        };
        persistence::save_database_to_file(self, &path)
    }

    // ---- dispatch (C6) ----

    pub fn exec(&self, conn_id: ConnectionId, argv: Vec<Vec<u8>>) -> Reply {
        if argv.is_empty() {
            return Reply::from(Error::EmptyCommand);
        }
        let verb = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();

        if command::registry().get(verb.as_str()).is_none() {
            return Reply::from(Error::UnknownCommand(verb));
        }

        match verb.as_str() {
            "multi" => return self.cmd_multi(conn_id),
            "exec" => return self.cmd_exec(conn_id),
            "discard" => return self.cmd_discard(conn_id),
            "watch" => return self.cmd_watch(conn_id, &argv[1..]),
            "unwatch" => return self.cmd_unwatch(conn_id),
            _ => {}
        }

        let in_multi = self.transactions.lock().unwrap().get(&conn_id).map(|t| t.in_multi).unwrap_or(false);
        if in_multi {
            self.transactions.lock().unwrap().entry(conn_id).or_default().queued.push(argv);
            return Reply::Queued;
        }

        self.dispatch_timed(conn_id, &verb, argv)
    }

    fn dispatch_timed(&self, conn_id: ConnectionId, verb: &str, argv: Vec<Vec<u8>>) -> Reply {
        let cmd = command::registry().get(verb).expect("verb already validated against the registry");
        let start = Instant::now();
        let reply = self.dispatch_one(conn_id, cmd, &argv);
        self.slowlog.record(start.elapsed(), argv);
        reply
    }

    fn dispatch_one(&self, conn_id: ConnectionId, cmd: &'static command::Command, argv: &[Vec<u8>]) -> Reply {
        if !command::arity_ok(cmd.arity, argv.len()) {
            return Reply::from(Error::WrongArity);
        }
        match (cmd.handler)(self, conn_id, argv) {
            Ok(reply) => {
                if cmd.is_write {
                    self.propagate_write(argv);
                }
                self.fan_out_to_monitors(argv);
                reply
            }
            Err(e) => Reply::from(e),
        }
    }

    /// Serializes the write, appends it to the AOF (if enabled, logging or
    /// aborting per `aof-on-error`), then hands it to replication for
    /// fan-out and backlog append. All three sinks see the same bytes, in
    /// this order, or none of them do — spec invariant 6. In `abort` mode an
    /// AOF write failure stops here: replicas and the backlog must not see a
    /// write the master didn't durably record.
    fn propagate_write(&self, argv: &[Vec<u8>]) {
        let bytes = resp_frame::encode_command(argv);
        if let Some(aof) = self.aof.lock().unwrap().as_mut() {
            if let Err(e) = aof.append(argv) {
                log::error!("AOF append failed, not propagating to replicas/backlog: {e}");
                return;
            }
        }
        self.replication.propagate(&bytes);
    }

    fn fan_out_to_monitors(&self, argv: &[Vec<u8>]) {
        let bytes = resp_frame::encode_command(argv);
        let mut monitors = self.monitors.lock().unwrap();
        monitors.retain_mut(|m| m.write_command(&bytes).is_ok());
    }

    fn cmd_multi(&self, conn_id: ConnectionId) -> Reply {
        let mut txs = self.transactions.lock().unwrap();
        if let Some(t) = txs.get(&conn_id) {
            if t.in_multi {
                return Reply::from(Error::NestedMulti);
            }
        }
        let entry = txs.entry(conn_id).or_default();
        entry.in_multi = true;
        entry.queued.clear();
        entry.aborted = false;
        Reply::Ok
    }

    fn cmd_discard(&self, conn_id: ConnectionId) -> Reply {
        let mut txs = self.transactions.lock().unwrap();
        match txs.get(&conn_id) {
            Some(t) if t.in_multi => {
                txs.remove(&conn_id);
                Reply::Ok
            }
            _ => Reply::from(Error::DiscardWithoutMulti),
        }
    }

    fn cmd_watch(&self, conn_id: ConnectionId, keys: &[Vec<u8>]) -> Reply {
        if keys.is_empty() {
            return Reply::from(Error::WrongArity);
        }
        {
            let txs = self.transactions.lock().unwrap();
            if let Some(t) = txs.get(&conn_id) {
                if t.in_multi {
                    return Reply::from(Error::WatchInsideMulti);
                }
            }
        }
        for key in keys {
            let version = match self.version_of(key) {
                Ok(v) => v,
                Err(e) => return Reply::from(e),
            };
            let mut txs = self.transactions.lock().unwrap();
            txs.entry(conn_id).or_default().watched.insert(key.clone(), version);
        }
        Reply::Ok
    }

    fn cmd_unwatch(&self, conn_id: ConnectionId) -> Reply {
        if let Some(t) = self.transactions.lock().unwrap().get_mut(&conn_id) {
            t.watched.clear();
        }
        Reply::Ok
    }

    fn cmd_exec(&self, conn_id: ConnectionId) -> Reply {
        let (queued, watched, aborted) = {
            let txs = self.transactions.lock().unwrap();
            match txs.get(&conn_id) {
                None => return Reply::from(Error::ExecWithoutMulti),
                Some(t) if !t.in_multi => return Reply::from(Error::ExecWithoutMulti),
                Some(t) => (t.queued.clone(), t.watched.clone(), t.aborted),
            }
        };

        for (key, observed) in &watched {
            let current = match self.version_of(key) {
                Ok(v) => v,
                Err(e) => {
                    self.transactions.lock().unwrap().remove(&conn_id);
                    return Reply::from(e);
                }
            };
            if current != *observed {
                self.transactions.lock().unwrap().remove(&conn_id);
                return Reply::from(Error::WatchConflict);
            }
        }
        if aborted {
            self.transactions.lock().unwrap().remove(&conn_id);
            return Reply::from(Error::TransactionAborted);
        }

        let mut results = Vec::with_capacity(queued.len());
        for argv in queued {
            if argv.is_empty() {
                results.push(Reply::from(Error::EmptyCommand));
                continue;
            }
            let verb = String::from_utf8_lossy(&argv[0]).to_ascii_lowercase();
            match command::registry().get(verb.as_str()) {
                None => results.push(Reply::from(Error::UnknownCommand(verb))),
                Some(_) => results.push(self.dispatch_timed(conn_id, &verb, argv)),
            }
        }

        self.transactions.lock().unwrap().remove(&conn_id);
        Reply::array(results)
    }

    /// Cancels any in-progress transaction state for a closed connection.
    pub fn on_connection_close(&self, conn_id: ConnectionId) {
        self.transactions.lock().unwrap().remove(&conn_id);
    }

    #[cfg(test)]
    pub fn debug_set_string(&self, key: &[u8], value: &[u8]) {
        self.put_entity(key.to_vec(), Entity::new(Value::String(StringValue::new(value.to_vec())))).unwrap();
    }

    #[cfg(test)]
    pub fn debug_get_string(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get_entity(key).unwrap().map(|e| match e.value {
            Value::String(s) => s.get().to_vec(),
            _ => panic!("not a string"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_entity_reports_absence_and_bumps_version() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert_eq!(
            db.put_entity(b"a".to_vec(), Entity::new(Value::String(StringValue::new(b"1".to_vec())))).unwrap(),
            1
        );
        assert_eq!(db.version_of(b"a").unwrap(), 1);
        assert_eq!(
            db.put_entity(b"a".to_vec(), Entity::new(Value::String(StringValue::new(b"2".to_vec())))).unwrap(),
            0
        );
        assert_eq!(db.version_of(b"a").unwrap(), 2);
    }

    #[test]
    fn expire_and_persist_bump_version() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.debug_set_string(b"a", b"1");
        let v0 = db.version_of(b"a").unwrap();
        assert_eq!(db.expire(b"a", Duration::from_secs(10)).unwrap(), 1);
        let v1 = db.version_of(b"a").unwrap();
        assert!(v1 > v0);
        assert_eq!(db.persist(b"a").unwrap(), 1);
        let v2 = db.version_of(b"a").unwrap();
        assert!(v2 > v1);
    }

    #[test]
    fn expire_on_watched_key_triggers_watch_conflict() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.debug_set_string(b"x", b"1");

        assert_eq!(db.exec(1, vec![b"WATCH".to_vec(), b"x".to_vec()]), Reply::Ok);
        assert_eq!(db.exec(1, vec![b"MULTI".to_vec()]), Reply::Ok);
        assert_eq!(
            db.exec(1, vec![b"GET".to_vec(), b"x".to_vec()]),
            Reply::Queued
        );

        // A different connection only EXPIREs x, never rewriting its value.
        db.exec(2, vec![b"EXPIRE".to_vec(), b"x".to_vec(), b"100".to_vec()]);

        assert!(matches!(db.exec(1, vec![b"EXEC".to_vec()]), Reply::Error(_)));
    }

    #[test]
    fn remove_clears_ttl_and_restarts_version() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.debug_set_string(b"a", b"1");
        db.expire(b"a", Duration::from_secs(10)).unwrap();
        assert_eq!(db.remove(b"a").unwrap(), 1);
        assert!(db.get_entity(b"a").unwrap().is_none());
        db.debug_set_string(b"a", b"2");
        assert_eq!(db.version_of(b"a").unwrap(), 1);
    }

    #[test]
    fn ttl_reports_missing_persistent_and_remaining() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert!(matches!(db.ttl(b"missing").unwrap(), TtlStatus::Missing));
        db.debug_set_string(b"a", b"1");
        assert!(matches!(db.ttl(b"a").unwrap(), TtlStatus::Persistent));
        db.expire(b"a", Duration::from_secs(10)).unwrap();
        assert!(matches!(db.ttl(b"a").unwrap(), TtlStatus::Remaining(_)));
    }

    #[test]
    fn expired_key_disappears_on_read() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.debug_set_string(b"a", b"1");
        db.expire(b"a", Duration::from_millis(1)).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(db.get_entity(b"a").unwrap().is_none());
        assert!(!db.exists(b"a").unwrap());
    }

    #[test]
    fn atomic_incr_creates_then_increments() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert_eq!(db.atomic_incr(b"counter", 1).unwrap(), 1);
        assert_eq!(db.atomic_incr(b"counter", 1).unwrap(), 2);
        assert_eq!(db.atomic_incr(b"counter", -2).unwrap(), 0);
    }

    #[test]
    fn atomic_incr_rejects_wrong_type() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.put_entity(b"h".to_vec(), Entity::new(Value::Hash(Default::default()))).unwrap();
        assert!(matches!(db.atomic_incr(b"h", 1), Err(Error::WrongType)));
    }

    #[test]
    fn watch_then_conflicting_write_aborts_exec() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.debug_set_string(b"x", b"1");

        assert_eq!(db.exec(1, vec![b"WATCH".to_vec(), b"x".to_vec()]), Reply::Ok);
        assert_eq!(db.exec(1, vec![b"MULTI".to_vec()]), Reply::Ok);
        assert_eq!(
            db.exec(1, vec![b"SET".to_vec(), b"x".to_vec(), b"1".to_vec()]),
            Reply::Queued
        );

        // A different connection writes x before EXEC runs.
        db.exec(2, vec![b"SET".to_vec(), b"x".to_vec(), b"2".to_vec()]);

        assert!(matches!(db.exec(1, vec![b"EXEC".to_vec()]), Reply::Error(_)));
        assert_eq!(db.debug_get_string(b"x"), Some(b"2".to_vec()));
    }

    #[test]
    fn transaction_without_conflict_applies_all_queued_writes() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.exec(1, vec![b"MULTI".to_vec()]);
        db.exec(1, vec![b"SET".to_vec(), b"k1".to_vec(), b"v1".to_vec()]);
        db.exec(1, vec![b"SET".to_vec(), b"k2".to_vec(), b"v2".to_vec()]);
        let reply = db.exec(1, vec![b"EXEC".to_vec()]);
        assert!(matches!(reply, Reply::Array(Some(items)) if items.len() == 2));
        assert_eq!(db.debug_get_string(b"k1"), Some(b"v1".to_vec()));
        assert_eq!(db.debug_get_string(b"k2"), Some(b"v2".to_vec()));
    }

    #[test]
    fn exec_without_multi_is_an_error() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        assert!(matches!(db.exec(1, vec![b"EXEC".to_vec()]), Reply::Error(_)));
    }

    #[test]
    fn nested_multi_is_rejected() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.exec(1, vec![b"MULTI".to_vec()]);
        assert!(matches!(db.exec(1, vec![b"MULTI".to_vec()]), Reply::Error(_)));
    }

    #[test]
    fn connection_close_discards_transaction_state() {
        let db = Database::open(DatabaseOptions::default()).unwrap();
        db.exec(1, vec![b"MULTI".to_vec()]);
        db.on_connection_close(1);
        assert!(matches!(db.exec(1, vec![b"EXEC".to_vec()]), Reply::Error(_)));
    }
}
