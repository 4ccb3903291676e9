//! C3: a hashed time wheel for active expiration. Runs on a dedicated
//! `std::thread` rather than a tokio task — the engine crate has no async
//! runtime dependency (tokio only appears in `server`, the client-facing
//! crate), and this is pure CPU/timer bookkeeping with no I/O.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const DEFAULT_TICK_MS: u64 = 10;
const DEFAULT_BUCKETS: usize = 1024;

type Callback = Arc<dyn Fn(&[u8]) + Send + Sync>;

struct Slot {
    bucket: usize,
    deadline: Instant,
}

struct Inner {
    buckets: Vec<HashMap<Vec<u8>, Instant>>,
    overflow: HashMap<Vec<u8>, Instant>,
    index: HashMap<Vec<u8>, Slot>,
    current: usize,
}

/// Bucketed scheduler for active expiration callbacks. `add`/`remove` are
/// cheap; the worker thread advances one bucket per tick and invokes the
/// callback for every entry whose deadline has elapsed.
pub struct TimeWheel {
    inner: Arc<Mutex<Inner>>,
    tick: Duration,
    buckets: usize,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    handle: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl TimeWheel {
    pub fn new(tick_ms: u64, buckets: usize) -> Self {
        let tick_ms = if tick_ms == 0 { DEFAULT_TICK_MS } else { tick_ms };
        let buckets = if buckets == 0 { DEFAULT_BUCKETS } else { buckets };
        let inner = Inner {
            buckets: (0..buckets).map(|_| HashMap::new()).collect(),
            overflow: HashMap::new(),
            index: HashMap::new(),
            current: 0,
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
            tick: Duration::from_millis(tick_ms),
            buckets,
            stop_tx: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TICK_MS, DEFAULT_BUCKETS)
    }

    /// Starts the worker thread. `on_expire` runs on the worker thread and
    /// must not block for long.
    pub fn start<F>(&self, on_expire: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(on_expire);
        let (tx, rx) = mpsc::channel();
        *self.stop_tx.lock().unwrap() = Some(tx);

        let inner = self.inner.clone();
        let tick = self.tick;
        let buckets = self.buckets;
        let handle = std::thread::spawn(move || loop {
            match rx.recv_timeout(tick) {
                Ok(()) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
            let expired = {
                let mut guard = inner.lock().unwrap();
                let cur = (guard.current + 1) % buckets;
                guard.current = cur;
                let now = Instant::now();
                let due: Vec<Vec<u8>> = guard.buckets[cur]
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in &due {
                    guard.buckets[cur].remove(k);
                    guard.index.remove(k);
                }

                // Bring overflow entries back into range when they're close
                // enough to land in a real bucket.
                let horizon = now + tick * buckets as u32;
                let promote: Vec<Vec<u8>> = guard
                    .overflow
                    .iter()
                    .filter(|(_, deadline)| **deadline <= horizon)
                    .map(|(k, _)| k.clone())
                    .collect();
                for k in promote {
                    if let Some(deadline) = guard.overflow.remove(&k) {
                        Self::place(&mut guard, tick, buckets, k, deadline);
                    }
                }
                due
            };
            for key in expired {
                callback(&key);
            }
        });
        *self.handle.lock().unwrap() = Some(handle);
    }

    fn place(guard: &mut Inner, tick: Duration, buckets: usize, key: Vec<u8>, deadline: Instant) {
        let now = Instant::now();
        let ticks_out = deadline.saturating_duration_since(now).as_nanos() / tick.as_nanos().max(1);
        if ticks_out as usize >= buckets {
            guard.index.insert(key.clone(), Slot { bucket: usize::MAX, deadline });
            guard.overflow.insert(key, deadline);
            return;
        }
        let bucket = (guard.current + ticks_out as usize) % buckets;
        guard.index.insert(key.clone(), Slot { bucket, deadline });
        guard.buckets[bucket].insert(key, deadline);
    }

    /// Computes an absolute deadline `ttl` from now and schedules `key`.
    /// Duplicate adds replace the prior schedule.
    pub fn add(&self, key: Vec<u8>, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        let mut guard = self.inner.lock().unwrap();
        if let Some(old) = guard.index.remove(&key) {
            if old.bucket == usize::MAX {
                guard.overflow.remove(&key);
            } else {
                guard.buckets[old.bucket].remove(&key);
            }
        }
        Self::place(&mut guard, self.tick, self.buckets, key, deadline);
    }

    /// O(1) via the auxiliary key→bucket index.
    pub fn remove(&self, key: &[u8]) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(slot) = guard.index.remove(key) {
            if slot.bucket == usize::MAX {
                guard.overflow.remove(key);
            } else {
                guard.buckets[slot.bucket].remove(key);
            }
        }
    }

    /// Drains and joins the worker, blocking until it exits its tick loop.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimeWheel {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn add_then_remove_prevents_callback() {
        let wheel = TimeWheel::new(5, 8);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        wheel.start(move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        wheel.add(b"a".to_vec(), Duration::from_millis(20));
        wheel.remove(b"a");
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        wheel.stop();
    }

    #[test]
    fn expired_entry_invokes_callback() {
        let wheel = TimeWheel::new(5, 8);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        wheel.start(move |_| {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        wheel.add(b"a".to_vec(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        wheel.stop();
    }

    #[test]
    fn stop_joins_worker_within_one_tick() {
        let wheel = TimeWheel::new(5, 8);
        wheel.start(|_| {});
        wheel.stop();
    }
}
