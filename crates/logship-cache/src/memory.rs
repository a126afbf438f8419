//! In-memory cache store.

use crate::{CacheStore, CachedEntry, EntryId, EntryState, StoreResult};
use logship_core::Destination;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::trace;

struct Slot {
    entry: CachedEntry,
    state: EntryState,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    slots: VecDeque<Slot>,
}

/// Cache store that lives for the process lifetime.
#[derive(Default)]
pub struct MemoryCacheStore {
    inner: Mutex<Inner>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn pending_count(&self) -> StoreResult<usize> {
        Ok(self.inner.lock().slots.len())
    }

    fn add(&self, destination: &Destination, payload: &[u8]) -> StoreResult<EntryId> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = EntryId(inner.next_id);
        inner.slots.push_back(Slot {
            entry: CachedEntry {
                id,
                destination: destination.clone(),
                payload: payload.to_vec(),
            },
            state: EntryState::Pending,
        });
        trace!(entry_id = %id, destination = %destination, "Cached entry");
        Ok(id)
    }

    fn checkout(&self) -> StoreResult<Vec<CachedEntry>> {
        let mut inner = self.inner.lock();
        let entries = inner
            .slots
            .iter_mut()
            .filter(|slot| slot.state == EntryState::Pending)
            .map(|slot| {
                slot.state = EntryState::InFlight;
                slot.entry.clone()
            })
            .collect();
        Ok(entries)
    }

    fn complete(&self, id: EntryId, delivered: bool) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let Some(index) = inner.slots.iter().position(|slot| slot.entry.id == id) else {
            return Ok(());
        };
        if delivered {
            inner.slots.remove(index);
        } else {
            inner.slots[index].state = EntryState::Pending;
        }
        Ok(())
    }
}
