//! C4: pluggable eviction policies over the key population. Each policy is
//! picked once at database construction from `maxmemory-policy`; `noeviction`
//! and unrecognized values disable eviction entirely (the database simply
//! never calls into a policy).

use rand::seq::SliceRandom;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait EvictionPolicy: Send + Sync {
    fn record_access(&self, key: &[u8]);
    fn record_update(&self, key: &[u8]);
    fn record_delete(&self, key: &[u8]);
    /// Selects up to `n` candidate keys to evict.
    fn evict(&self, n: usize) -> Vec<Vec<u8>>;
    /// Notifies the policy a key now expires at `deadline`. Only `Ttl`
    /// cares; every other policy keeps the default no-op.
    fn record_expire(&self, _key: &[u8], _deadline: Instant) {}
}

/// Doubly-linked recency order modeled as an ordered `VecDeque` of keys
/// (most-recently-used at the back); cheap enough at the scale this engine
/// targets and avoids unsafe intrusive-list machinery.
pub struct Lru {
    order: Mutex<VecDeque<Vec<u8>>>,
}

impl Lru {
    pub fn new() -> Self {
        Self { order: Mutex::new(VecDeque::new()) }
    }

    fn touch(&self, key: &[u8]) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
        order.push_back(key.to_vec());
    }
}

impl EvictionPolicy for Lru {
    fn record_access(&self, key: &[u8]) {
        self.touch(key);
    }

    fn record_update(&self, key: &[u8]) {
        self.touch(key);
    }

    fn record_delete(&self, key: &[u8]) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    fn evict(&self, n: usize) -> Vec<Vec<u8>> {
        let mut order = self.order.lock().unwrap();
        let take = n.min(order.len());
        order.drain(..take).collect()
    }
}

/// Frequency counter per key with logarithmic decay: each access adds 1 to a
/// running count that is halved whenever more than a decay interval has
/// elapsed since the last touch, approximating Redis's LFU counter decay
/// without needing its exact probabilistic increment curve.
pub struct Lfu {
    freq: Mutex<HashMap<Vec<u8>, (f64, Instant)>>,
    decay_interval: Duration,
}

impl Lfu {
    pub fn new() -> Self {
        Self::with_decay(Duration::from_secs(60))
    }

    pub fn with_decay(decay_interval: Duration) -> Self {
        Self { freq: Mutex::new(HashMap::new()), decay_interval }
    }

    fn bump(&self, key: &[u8]) {
        let mut freq = self.freq.lock().unwrap();
        let now = Instant::now();
        let entry = freq.entry(key.to_vec()).or_insert((0.0, now));
        let elapsed = now.saturating_duration_since(entry.1);
        let decays = (elapsed.as_secs_f64() / self.decay_interval.as_secs_f64()).floor();
        if decays >= 1.0 {
            entry.0 /= 2f64.powf(decays);
        }
        entry.0 += 1.0;
        entry.1 = now;
    }
}

impl EvictionPolicy for Lfu {
    fn record_access(&self, key: &[u8]) {
        self.bump(key);
    }

    fn record_update(&self, key: &[u8]) {
        self.bump(key);
    }

    fn record_delete(&self, key: &[u8]) {
        self.freq.lock().unwrap().remove(key);
    }

    fn evict(&self, n: usize) -> Vec<Vec<u8>> {
        let mut freq = self.freq.lock().unwrap();
        let mut entries: Vec<(Vec<u8>, f64, Instant)> =
            freq.iter().map(|(k, (f, t))| (k.clone(), *f, *t)).collect();
        // lowest frequency first; ties broken by oldest touch.
        entries.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.2.cmp(&b.2)));
        let picked: Vec<Vec<u8>> = entries.into_iter().take(n).map(|(k, _, _)| k).collect();
        for k in &picked {
            freq.remove(k);
        }
        picked
    }
}

/// Samples from the current key set via reservoir sampling.
pub struct Random {
    keys: Mutex<Vec<Vec<u8>>>,
}

impl Random {
    pub fn new() -> Self {
        Self { keys: Mutex::new(Vec::new()) }
    }
}

impl EvictionPolicy for Random {
    /// The database calls this (not `record_update`) for a brand-new key, so
    /// this has to register the key too — otherwise a key that's only ever
    /// `SET` once never becomes an eviction candidate.
    fn record_access(&self, key: &[u8]) {
        let mut keys = self.keys.lock().unwrap();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_vec());
        }
    }

    fn record_update(&self, key: &[u8]) {
        let mut keys = self.keys.lock().unwrap();
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_vec());
        }
    }

    fn record_delete(&self, key: &[u8]) {
        let mut keys = self.keys.lock().unwrap();
        if let Some(pos) = keys.iter().position(|k| k == key) {
            keys.remove(pos);
        }
    }

    fn evict(&self, n: usize) -> Vec<Vec<u8>> {
        let mut keys = self.keys.lock().unwrap();
        let mut rng = rand::thread_rng();
        let take = n.min(keys.len());
        let sample: Vec<Vec<u8>> = keys.choose_multiple(&mut rng, take).cloned().collect();
        for k in &sample {
            if let Some(pos) = keys.iter().position(|existing| existing == k) {
                keys.remove(pos);
            }
        }
        sample
    }
}

/// Only meaningful for keys carrying an expiration; evicts the nearest
/// deadlines first. The database is responsible for only registering keys
/// that actually have a TTL.
pub struct Ttl {
    deadlines: Mutex<HashMap<Vec<u8>, Instant>>,
}

impl Ttl {
    pub fn new() -> Self {
        Self { deadlines: Mutex::new(HashMap::new()) }
    }

    pub fn record_deadline(&self, key: &[u8], deadline: Instant) {
        self.deadlines.lock().unwrap().insert(key.to_vec(), deadline);
    }
}

impl EvictionPolicy for Ttl {
    fn record_access(&self, _key: &[u8]) {}
    fn record_update(&self, _key: &[u8]) {}

    fn record_delete(&self, key: &[u8]) {
        self.deadlines.lock().unwrap().remove(key);
    }

    fn record_expire(&self, key: &[u8], deadline: Instant) {
        self.record_deadline(key, deadline);
    }

    fn evict(&self, n: usize) -> Vec<Vec<u8>> {
        let mut deadlines = self.deadlines.lock().unwrap();
        let mut entries: Vec<(Vec<u8>, Instant)> = deadlines.iter().map(|(k, t)| (k.clone(), *t)).collect();
        entries.sort_by_key(|(_, t)| *t);
        let picked: Vec<Vec<u8>> = entries.into_iter().take(n).map(|(k, _)| k).collect();
        for k in &picked {
            deadlines.remove(k);
        }
        picked
    }
}

/// Parses `maxmemory-policy`. Returns `None` for `noeviction` or an
/// unrecognized value, which disables eviction.
pub fn policy_from_config(name: &str) -> Option<Box<dyn EvictionPolicy>> {
    match name {
        "allkeys-lru" | "volatile-lru" => Some(Box::new(Lru::new())),
        "allkeys-lfu" | "volatile-lfu" => Some(Box::new(Lfu::new())),
        "allkeys-random" | "volatile-random" => Some(Box::new(Random::new())),
        "volatile-ttl" => Some(Box::new(Ttl::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_least_recently_used_first() {
        let lru = Lru::new();
        lru.record_update(b"a");
        lru.record_update(b"b");
        lru.record_update(b"c");
        lru.record_access(b"a");
        let evicted = lru.evict(1);
        assert_eq!(evicted, vec![b"b".to_vec()]);
    }

    #[test]
    fn random_never_returns_more_than_available() {
        let r = Random::new();
        r.record_update(b"a");
        r.record_update(b"b");
        assert_eq!(r.evict(10).len(), 2);
    }

    #[test]
    fn random_registers_keys_seen_only_through_record_access() {
        // This is the path a brand-new key takes (`Database::put_entity`'s
        // `!existed` branch), as opposed to an overwrite.
        let r = Random::new();
        r.record_access(b"fresh");
        assert_eq!(r.evict(10), vec![b"fresh".to_vec()]);
    }

    #[test]
    fn ttl_evicts_nearest_deadline_first() {
        let ttl = Ttl::new();
        let now = Instant::now();
        ttl.record_deadline(b"far", now + Duration::from_secs(100));
        ttl.record_deadline(b"near", now + Duration::from_secs(1));
        assert_eq!(ttl.evict(1), vec![b"near".to_vec()]);
    }

    #[test]
    fn policy_from_config_disables_on_noeviction() {
        assert!(policy_from_config("noeviction").is_none());
        assert!(policy_from_config("bogus").is_none());
        assert!(policy_from_config("allkeys-lru").is_some());
    }
}
