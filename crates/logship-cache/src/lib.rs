//! Cache stores for undelivered log payloads.
//!
//! A [`CacheStore`] holds `(Destination, payload)` pairs that failed to
//! deliver. Entries are checked out for a resubmission pass and either
//! deleted on success or returned to pending on failure.
//!
//! Two backends are provided:
//! - [`MemoryCacheStore`] lives for the process lifetime.
//! - [`SqliteCacheStore`] persists across restarts.

mod error;
mod memory;
mod migrations;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryCacheStore;
pub use migrations::CURRENT_VERSION;
pub use sqlite::SqliteCacheStore;
pub use store::{for_each_pending, CacheStore, CachedEntry, Completion, EntryId, EntryState};
