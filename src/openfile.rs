//! Per-session open-file cache (C8).
//!
//! Grounded on the same "small `Mutex`-guarded map, mutated from ordinary
//! async method calls" idiom as `share::FileIdCache` and
//! `protocol::rpc::transaction_tracker::TransactionTracker`. An entry is
//! never opened twice for the same `(session, fileId)` pair - `get_or_open`
//! serialises the check-then-open sequence under the cache's own lock so
//! two concurrent requests for the same file can't race into two opens.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

use crate::handle::FileId;

/// Access granted when a back-end file was opened, matching §3's
/// "read-only entry may be upgraded to read-write" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAccess {
    ReadOnly,
    ReadWrite,
}

/// `(fileId, granted-access)`. The back end in this server is id-native
/// (every operation already takes a bare `fileid3`), so there is no
/// separate "back-end file object" handle to cache the way a POSIX-style
/// open-fd back end would; what this cache tracks and serialises is the
/// *access level* a session has established for a given id, which is the
/// part of §4.8 that has observable protocol behavior (GETATTR-on-open
/// sourcing, read/write upgrade).
#[derive(Debug, Clone)]
pub struct OpenFileEntry {
    pub file_id: FileId,
    pub access: OpenAccess,
    /// Size as of this session's last `WRITE` to the file, if any. `GETATTR`
    /// must prefer this over the back end's own size while the file is open
    /// (§4.11 row 1) so a client that wrote and immediately stat'd the file
    /// sees its own write rather than a back end that hasn't caught up yet.
    pub cached_size: Option<u64>,
}

/// Per-session cache of opened back-end files (§4.8).
#[derive(Default)]
pub struct OpenFileCache {
    entries: Mutex<HashMap<FileId, OpenFileEntry>>,
}

impl OpenFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `getOrOpen(handle, readOnly)`: returns the entry for `file_id`,
    /// opening (or upgrading) it first if necessary. `want_write` selects
    /// between a plain open and the upgrade path in step 2 of §4.8.
    pub fn get_or_open(&self, file_id: FileId, want_write: bool) -> OpenFileEntry {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(&file_id) {
            if !want_write || entry.access == OpenAccess::ReadWrite {
                return entry.clone();
            }
        }
        let access = if want_write { OpenAccess::ReadWrite } else { OpenAccess::ReadOnly };
        let cached_size = entries.get(&file_id).and_then(|e| e.cached_size);
        let entry = OpenFileEntry { file_id, access, cached_size };
        entries.insert(file_id, entry.clone());
        entry
    }

    pub fn get(&self, file_id: FileId) -> Option<OpenFileEntry> {
        self.entries.lock().unwrap().get(&file_id).cloned()
    }

    /// Records the size a `WRITE` on this session just produced, so a
    /// subsequent `GETATTR` on the same (still-open) file reflects it
    /// immediately (§4.11 row 1). A no-op if the file isn't in the cache -
    /// callers open it (via `get_or_open`) before writing.
    pub fn update_size(&self, file_id: FileId, size: u64) {
        if let Some(entry) = self.entries.lock().unwrap().get_mut(&file_id) {
            entry.cached_size = Some(size);
        }
    }

    /// Removes the entry for `file_id`, e.g. on `REMOVE` or explicit close.
    pub fn close(&self, file_id: FileId) {
        self.entries.lock().unwrap().remove(&file_id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for OpenFileCache {
    /// Finalisation pass: log leaked entries rather than closing them from
    /// this (arbitrary) thread, per §4.8's "must not close them from an
    /// arbitrary thread".
    fn drop(&mut self) {
        let entries = self.entries.lock().unwrap();
        if !entries.is_empty() {
            warn!(count = entries.len(), "session teardown with open-file entries still cached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_read_only_then_upgrades_to_write() {
        let cache = OpenFileCache::new();
        let ro = cache.get_or_open(1, false);
        assert_eq!(ro.access, OpenAccess::ReadOnly);
        let rw = cache.get_or_open(1, true);
        assert_eq!(rw.access, OpenAccess::ReadWrite);
        // subsequent read-only request sees the upgraded entry
        assert_eq!(cache.get(1).unwrap().access, OpenAccess::ReadWrite);
    }

    #[test]
    fn update_size_is_visible_on_subsequent_get() {
        let cache = OpenFileCache::new();
        cache.get_or_open(3, true);
        assert_eq!(cache.get(3).unwrap().cached_size, None);
        cache.update_size(3, 42);
        assert_eq!(cache.get(3).unwrap().cached_size, Some(42));
        // the upgrade path in get_or_open must not drop a cached size
        let entry = cache.get_or_open(3, true);
        assert_eq!(entry.cached_size, Some(42));
    }

    #[test]
    fn close_removes_entry() {
        let cache = OpenFileCache::new();
        cache.get_or_open(5, false);
        cache.close(5);
        assert!(cache.get(5).is_none());
    }
}
