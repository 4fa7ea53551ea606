//! time-bounded idempotency cache for consumed entries.
//!
//! an id is either being applied (claimed) or already applied (seen until
//! its ttl runs out). claiming is atomic, so two concurrent deliveries of
//! the same entry can never both apply it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// default time an applied id is remembered.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
enum Slot {
    InFlight,
    Seen(Instant),
}

/// shared set of recently applied entry ids.
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    slots: Arc<Mutex<HashMap<Uuid, Slot>>>,
    ttl: Duration,
}

impl IdempotencyCache {
    /// a cache remembering ids for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// claim `id` for applying.
    ///
    /// returns `None` when the id was already applied within the ttl or is
    /// being applied right now. dropping the claim without
    /// [`commit`](Claim::commit) releases it so a redelivery can retry.
    pub fn try_claim(&self, id: Uuid) -> Option<Claim> {
        let mut slots = self.lock();
        match slots.get(&id) {
            Some(Slot::InFlight) => return None,
            Some(Slot::Seen(at)) if at.elapsed() < self.ttl => return None,
            _ => {}
        }
        slots.insert(id, Slot::InFlight);
        Some(Claim {
            cache: self.clone(),
            id,
            committed: false,
        })
    }

    /// record `id` as applied without going through a claim.
    pub fn mark_seen(&self, id: Uuid) {
        self.lock().insert(id, Slot::Seen(Instant::now()));
    }

    /// whether `id` was applied within the ttl.
    pub fn contains(&self, id: Uuid) -> bool {
        matches!(self.lock().get(&id), Some(Slot::Seen(at)) if at.elapsed() < self.ttl)
    }

    /// number of tracked ids, expired ones included until the next sweep.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        slots.retain(|_, slot| match slot {
            Slot::InFlight => true,
            Slot::Seen(at) => at.elapsed() < ttl,
        });
        slots
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// an in-flight claim on one entry id.
#[derive(Debug)]
pub struct Claim {
    cache: IdempotencyCache,
    id: Uuid,
    committed: bool,
}

impl Claim {
    /// the claimed id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// mark the entry as applied.
    pub fn commit(mut self) {
        self.committed = true;
        self.cache.mark_seen(self.id);
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.committed {
            self.cache.lock().remove(&self.id);
        }
    }
}
