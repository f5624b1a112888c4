//! Per-key call coalescing.
//!
//! Concurrent callers asking for the same key share one execution of the
//! work future. The first caller spawns it on its own task; every caller,
//! the first included, waits on a shared slot and receives a clone of the
//! output. The key is forgotten when the spawned task finishes, so a later
//! caller starts a fresh execution.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;

type Slot<V> = watch::Receiver<Option<V>>;
type Calls<K, V> = Arc<Mutex<HashMap<K, Slot<V>>>>;

/// How a caller took part in a coalesced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This caller started the work.
    Leader,
    /// This caller waited for another caller's result.
    Follower,
}

/// The spawned work ended without producing a value (it panicked or the
/// runtime shut down).
#[derive(Debug, Clone, Copy, Error)]
#[error("in-flight call ended without a result")]
pub struct Abandoned;

/// Coalesces concurrent calls that share a key.
///
/// The work outlives its callers: dropping every waiting future leaves the
/// key in flight until the spawned task completes, and callers arriving in
/// the meantime join it instead of starting another.
pub struct Singleflight<K, V> {
    calls: Calls<K, V>,
}

impl<K, V> Default for Singleflight<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Singleflight<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a coordinator with no calls in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `work` for `key` unless a call for `key` is already in flight,
    /// in which case waits for that call and returns its output.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Abandoned`] if the spawned work stopped before producing
    /// a value.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<(V, Role), Abandoned>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (mut slot, role) = {
            let mut calls = self.calls.lock();
            if let Some(slot) = calls.get(&key) {
                (slot.clone(), Role::Follower)
            } else {
                let (tx, rx) = watch::channel(None);
                calls.insert(key.clone(), rx.clone());
                let guard = InFlight {
                    calls: Arc::clone(&self.calls),
                    key,
                    slot: rx.clone(),
                };
                let work = work();
                tokio::spawn(async move {
                    let value = work.await;
                    drop(guard);
                    tx.send_replace(Some(value));
                });
                (rx, Role::Leader)
            }
        };

        let value = slot
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Abandoned)?
            .clone()
            .ok_or(Abandoned)?;
        Ok((value, role))
    }

    /// Number of keys with a call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Clears the key owned by a spawned call, whether it finishes or unwinds.
struct InFlight<K: Hash + Eq, V> {
    calls: Calls<K, V>,
    key: K,
    slot: Slot<V>,
}

impl<K: Hash + Eq, V> Drop for InFlight<K, V> {
    fn drop(&mut self) {
        let mut calls = self.calls.lock();
        if calls
            .get(&self.key)
            .is_some_and(|slot| slot.same_channel(&self.slot))
        {
            calls.remove(&self.key);
        }
    }
}
