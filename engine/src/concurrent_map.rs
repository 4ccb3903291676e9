//! C1: a fixed-arity sharded hash map. Generalizes the single
//! `Arc<Mutex<Engine>>` the storage layer used to share one lock across the
//! whole keyspace — here every key is routed to one of `N` shards, each
//! behind its own reader-writer lock, so writers to different shards never
//! block each other. Writers don't block readers of other shards; readers
//! don't block writers of other shards.

use crate::error::{CResult, Error};
use crate::hash::fnv1a;
use std::collections::HashMap;
use std::sync::RwLock;

/// Key type used throughout the engine: binary-safe, case-sensitive byte
/// strings.
pub type Key = Vec<u8>;

pub struct ConcurrentMap<V> {
    shards: Vec<RwLock<HashMap<Key, V>>>,
    mask: u64,
}

impl<V: Clone> ConcurrentMap<V> {
    /// `shard_count` must be a power of two; defaults to 16 at call sites
    /// that don't care.
    pub fn new(shard_count: usize) -> Self {
        assert!(shard_count.is_power_of_two(), "shard_count must be a power of two");
        let mut shards = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            shards.push(RwLock::new(HashMap::new()));
        }
        Self { shards, mask: shard_count as u64 - 1 }
    }

    fn shard_for(&self, key: &[u8]) -> &RwLock<HashMap<Key, V>> {
        let idx = (fnv1a(key) & self.mask) as usize;
        &self.shards[idx]
    }

    pub fn get(&self, key: &[u8]) -> CResult<Option<V>> {
        let shard = self.shard_for(key).read().map_err(|e| Error::Lock(e.to_string()))?;
        Ok(shard.get(key).cloned())
    }

    /// Returns 1 if the key was absent before this write, 0 if it overwrote
    /// an existing entry.
    pub fn put(&self, key: Key, value: V) -> CResult<i64> {
        let mut shard = self.shard_for(&key).write().map_err(|e| Error::Lock(e.to_string()))?;
        Ok(if shard.insert(key, value).is_none() { 1 } else { 0 })
    }

    pub fn put_if_absent(&self, key: Key, value: V) -> CResult<i64> {
        let mut shard = self.shard_for(&key).write().map_err(|e| Error::Lock(e.to_string()))?;
        if shard.contains_key(&key) {
            Ok(0)
        } else {
            shard.insert(key, value);
            Ok(1)
        }
    }

    pub fn put_if_exists(&self, key: Key, value: V) -> CResult<i64> {
        let mut shard = self.shard_for(&key).write().map_err(|e| Error::Lock(e.to_string()))?;
        if shard.contains_key(&key) {
            shard.insert(key, value);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    pub fn remove(&self, key: &[u8]) -> CResult<i64> {
        let mut shard = self.shard_for(key).write().map_err(|e| Error::Lock(e.to_string()))?;
        Ok(if shard.remove(key).is_some() { 1 } else { 0 })
    }

    pub fn len(&self) -> CResult<usize> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().map_err(|e| Error::Lock(e.to_string()))?.len();
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> CResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of keys across shards; no cross-shard consistency guarantee.
    pub fn keys(&self) -> CResult<Vec<Key>> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().map_err(|e| Error::Lock(e.to_string()))?;
            out.extend(shard.keys().cloned());
        }
        Ok(out)
    }

    /// Visits every `(key, value)` pair shard by shard, each shard
    /// read-locked only while it is visited. `f` returns `false` to stop
    /// iteration early.
    pub fn for_each<F>(&self, mut f: F) -> CResult<()>
    where
        F: FnMut(&Key, &V) -> bool,
    {
        for shard in &self.shards {
            let shard = shard.read().map_err(|e| Error::Lock(e.to_string()))?;
            for (k, v) in shard.iter() {
                if !f(k, v) {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// The sole read-modify-write primitive: the shard's write lock is held
    /// across `f`, so a concurrent `atomic_update` on the same key
    /// linearizes without a second round trip. `f` must not call back into
    /// this map for the same shard — there is no re-entrancy support.
    pub fn atomic_update<F, R>(&self, key: &[u8], f: F) -> CResult<R>
    where
        F: FnOnce(Option<V>) -> CResult<(Option<V>, R)>,
    {
        let mut shard = self.shard_for(key).write().map_err(|e| Error::Lock(e.to_string()))?;
        let existing = shard.get(key).cloned();
        let (new_value, ret) = f(existing)?;
        match new_value {
            Some(v) => {
                shard.insert(key.to_vec(), v);
            }
            None => {
                shard.remove(key);
            }
        }
        Ok(ret)
    }

    pub fn clear(&self) -> CResult<()> {
        for shard in &self.shards {
            shard.write().map_err(|e| Error::Lock(e.to_string()))?.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_reports_absence() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        assert_eq!(m.put(b"a".to_vec(), 1).unwrap(), 1);
        assert_eq!(m.put(b"a".to_vec(), 2).unwrap(), 0);
        assert_eq!(m.get(b"a").unwrap(), Some(2));
    }

    #[test]
    fn put_if_absent_and_exists() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        assert_eq!(m.put_if_exists(b"a".to_vec(), 1).unwrap(), 0);
        assert_eq!(m.put_if_absent(b"a".to_vec(), 1).unwrap(), 1);
        assert_eq!(m.put_if_absent(b"a".to_vec(), 2).unwrap(), 0);
        assert_eq!(m.put_if_exists(b"a".to_vec(), 3).unwrap(), 1);
        assert_eq!(m.get(b"a").unwrap(), Some(3));
    }

    #[test]
    fn remove_reports_presence() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        assert_eq!(m.remove(b"a").unwrap(), 0);
        m.put(b"a".to_vec(), 1).unwrap();
        assert_eq!(m.remove(b"a").unwrap(), 1);
        assert_eq!(m.get(b"a").unwrap(), None);
    }

    #[test]
    fn atomic_update_creates_and_increments() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        let v = m
            .atomic_update(b"counter", |cur| {
                let next = cur.unwrap_or(0) + 1;
                Ok((Some(next), next))
            })
            .unwrap();
        assert_eq!(v, 1);
        let v = m
            .atomic_update(b"counter", |cur| {
                let next = cur.unwrap_or(0) + 1;
                Ok((Some(next), next))
            })
            .unwrap();
        assert_eq!(v, 2);
    }

    #[test]
    fn atomic_update_can_delete() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        m.put(b"a".to_vec(), 1).unwrap();
        m.atomic_update(b"a", |_| Ok::<_, Error>((None, ()))).unwrap();
        assert_eq!(m.get(b"a").unwrap(), None);
    }

    #[test]
    fn for_each_visits_every_shard() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(4);
        for i in 0..20i64 {
            m.put(format!("k{i}").into_bytes(), i).unwrap();
        }
        let mut seen = 0;
        m.for_each(|_, _| {
            seen += 1;
            true
        })
        .unwrap();
        assert_eq!(seen, 20);
    }

    #[test]
    fn keys_snapshot_matches_len() {
        let m: ConcurrentMap<i64> = ConcurrentMap::new(8);
        for i in 0..50i64 {
            m.put(format!("k{i}").into_bytes(), i).unwrap();
        }
        assert_eq!(m.keys().unwrap().len(), m.len().unwrap());
    }

    #[test]
    #[should_panic]
    fn shard_count_must_be_power_of_two() {
        let _: ConcurrentMap<i64> = ConcurrentMap::new(3);
    }
}
