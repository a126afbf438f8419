//! The cache store contract.

use crate::StoreResult;
use logship_core::Destination;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Store-assigned identifier of a cached entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a cached entry. Delivered entries are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for the next resubmission pass.
    Pending,
    /// Checked out by a pass whose outcome has not been reported yet.
    InFlight,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::InFlight => "in_flight",
        }
    }
}

/// A payload that failed delivery, together with where it was headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub id: EntryId,
    pub destination: Destination,
    pub payload: Vec<u8>,
}

/// FIFO collection of undelivered payloads.
///
/// Every mutation is atomic with respect to the other methods on the same
/// store instance.
pub trait CacheStore: Send + Sync {
    /// True while any entry is stored, whether pending or in flight.
    fn has_pending(&self) -> StoreResult<bool> {
        Ok(self.pending_count()? > 0)
    }

    /// Number of stored entries, pending or in flight.
    fn pending_count(&self) -> StoreResult<usize>;

    /// Append an entry in the pending state.
    fn add(&self, destination: &Destination, payload: &[u8]) -> StoreResult<EntryId>;

    /// Snapshot all pending entries in insertion order and mark them in flight.
    fn checkout(&self) -> StoreResult<Vec<CachedEntry>>;

    /// Report the outcome for a checked-out entry.
    ///
    /// `true` deletes the entry, `false` returns it to pending. Unknown ids
    /// are ignored.
    fn complete(&self, id: EntryId, delivered: bool) -> StoreResult<()>;
}

/// One-shot outcome handle for an entry visited by [`for_each_pending`].
///
/// Dropping the handle without calling [`Completion::report`] returns the
/// entry to pending. The handle does not keep the store alive; reporting
/// after the store is gone does nothing.
pub struct Completion {
    store: Weak<dyn CacheStore>,
    id: EntryId,
    reported: bool,
}

impl Completion {
    /// Report whether the entry was delivered.
    pub fn report(mut self, delivered: bool) -> StoreResult<()> {
        self.reported = true;
        self.finish(delivered)
    }

    fn finish(&self, delivered: bool) -> StoreResult<()> {
        match self.store.upgrade() {
            Some(store) => store.complete(self.id, delivered),
            None => {
                debug!(entry_id = %self.id, "Cache store dropped before outcome was reported");
                Ok(())
            }
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        if let Err(e) = self.finish(false) {
            warn!(entry_id = %self.id, error = %e, "Failed to return unreported entry to pending");
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("reported", &self.reported)
            .finish()
    }
}

/// Visit every pending entry once, handing out a [`Completion`] for each.
///
/// Entries are marked in flight before the first visit, so entries added
/// while the caller is still resubmitting wait for the next pass. Returns
/// the number of entries visited.
pub fn for_each_pending<F>(store: &Arc<dyn CacheStore>, mut visit: F) -> StoreResult<usize>
where
    F: FnMut(CachedEntry, Completion),
{
    let entries = store.checkout()?;
    let visited = entries.len();
    let weak = Arc::downgrade(store);

    for entry in entries {
        let completion = Completion {
            store: weak.clone(),
            id: entry.id,
            reported: false,
        };
        visit(entry, completion);
    }

    Ok(visited)
}
