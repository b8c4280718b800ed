//! Per-pair locks for stores without an atomic upsert.
//!
//! An arena of async mutexes keyed by (user, product). Entries are created on
//! demand and held weakly, so once no request holds or waits on a pair's lock
//! the entry is dead and gets swept on the next acquisition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use cartline_core::{ProductIdentity, UserIdentity};

type PairKey = (UserIdentity, ProductIdentity);

/// Arena of per-(user, product) locks.
#[derive(Debug, Default)]
pub struct PairLocks {
    slots: Mutex<HashMap<PairKey, Weak<AsyncMutex<()>>>>,
}

/// Exclusive access to one pair. Released on drop.
#[derive(Debug)]
pub struct PairGuard {
    _guard: OwnedMutexGuard<()>,
}

impl PairLocks {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the pair.
    pub async fn lock(&self, user: &UserIdentity, product: &ProductIdentity) -> PairGuard {
        let slot = self.slot(user, product);
        PairGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of pairs currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }

    /// Whether no pair is currently held or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, user: &UserIdentity, product: &ProductIdentity) -> Arc<AsyncMutex<()>> {
        // The map is only touched synchronously, so a poisoned lock still holds a valid map
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| slot.strong_count() > 0);

        let key = (user.clone(), product.clone());
        if let Some(live) = slots.get(&key).and_then(Weak::upgrade) {
            return live;
        }

        let fresh = Arc::new(AsyncMutex::new(()));
        slots.insert(key, Arc::downgrade(&fresh));
        fresh
    }
}
