//! Shares, the share registry, and the per-share file-id cache (C7).
//!
//! A [`Share`] is a logical mount point: a name, a stable share-id hashed
//! from that name, the back-end [`NFSFileSystem`](crate::vfs::NFSFileSystem)
//! that answers for it, and the bidirectional file-id cache described in
//! `SPEC_FULL.md` §4.7. The [`ShareRegistry`] is the server-instance-wide
//! lookup from both share name and share id to `Share`, grounded on the
//! locking idiom already used by `protocol::nfs::portmap::PortmapTable`
//! (a single `RwLock` guarding a small map that changes rarely and is read
//! on every request).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, RwLock};

use crate::handle::{FileId, Handle, ShareId};
use crate::protocol::xdr::nfs3;
use crate::vfs::NFSFileSystem;

/// Hashes a share name into a stable, nonzero 32-bit share id. Stable only
/// within a single running binary version: it is a `DefaultHasher` digest,
/// not a cryptographic or cross-version-stable hash, matching the spec's
/// requirement that handles merely survive *restarts* of the same server.
pub fn hash_share_name(name: &str) -> ShareId {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    let h = hasher.finish();
    // Fold to 32 bits and avoid the reserved id 0 (used by nothing, but
    // kept free so a zeroed handle is unambiguously invalid).
    let folded = ((h >> 32) ^ h) as u32;
    if folded == 0 {
        1
    } else {
        folded
    }
}

/// Bidirectional `fileId <-> share-relative path` cache (§4.7).
///
/// Both directions are needed: the dispatcher receives handles carrying
/// only a back-end id (-> need the path for logging and for `RENAME`
/// bookkeeping), while `LOOKUP`/`READDIR` results are discovered by path
/// and must be inserted under their id. Protected by one lock per
/// direction so a `RENAME`'s delete-then-insert doesn't need to hold both
/// at once longer than necessary.
#[derive(Default)]
pub struct FileIdCache {
    id_to_path: Mutex<HashMap<FileId, String>>,
    path_to_id: Mutex<HashMap<String, FileId>>,
}

impl FileIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `path -> id` if `path` is not already cached, matching the
    /// "insert if absent" rule for `LOOKUP`/`CREATE`/`MKDIR`/`SYMLINK`/
    /// `READDIR*` entries.
    pub fn insert_if_absent(&self, id: FileId, path: &str) {
        let mut path_to_id = self.path_to_id.lock().unwrap();
        if path_to_id.contains_key(path) {
            return;
        }
        path_to_id.insert(path.to_string(), id);
        self.id_to_path.lock().unwrap().entry(id).or_insert_with(|| path.to_string());
    }

    /// Unconditionally (re-)associates `path` with `id`, used by `RENAME`
    /// to keep the **same** id mapped to the new path.
    pub fn reassociate(&self, id: FileId, new_path: &str) {
        self.path_to_id.lock().unwrap().insert(new_path.to_string(), id);
        self.id_to_path.lock().unwrap().insert(id, new_path.to_string());
    }

    /// Removes the cache entry for `path`, used by `REMOVE`/`RMDIR` and by
    /// `RENAME` to drop the source path (the id itself is kept alive under
    /// the destination path by `reassociate`).
    pub fn remove_path(&self, path: &str) {
        if let Some(id) = self.path_to_id.lock().unwrap().remove(path) {
            let mut id_to_path = self.id_to_path.lock().unwrap();
            if id_to_path.get(&id).map(|p| p.as_str()) == Some(path) {
                id_to_path.remove(&id);
            }
        }
    }

    /// Removes every cache entry for `id`, used by `REMOVE` on the id an
    /// open-file entry might still reference.
    pub fn remove_id(&self, id: FileId) {
        if let Some(path) = self.id_to_path.lock().unwrap().remove(&id) {
            self.path_to_id.lock().unwrap().remove(&path);
        }
    }

    pub fn path_for_id(&self, id: FileId) -> Option<String> {
        self.id_to_path.lock().unwrap().get(&id).cloned()
    }

    pub fn id_for_path(&self, path: &str) -> Option<FileId> {
        self.path_to_id.lock().unwrap().get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.id_to_path.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Access permission a session's tree connection to a share carries.
/// Mirrors `SPEC_FULL.md` §3's `NoAccess|ReadOnly|ReadWrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPermission {
    NoAccess,
    ReadOnly,
    ReadWrite,
}

/// A logical mount point exposing one back-end filesystem.
pub struct Share {
    pub id: ShareId,
    pub name: String,
    pub vfs: Arc<dyn NFSFileSystem + Send + Sync>,
    pub file_id_cache: FileIdCache,
}

impl Share {
    pub fn new(name: impl Into<String>, vfs: Arc<dyn NFSFileSystem + Send + Sync>) -> Self {
        let name = name.into();
        Share { id: hash_share_name(&name), name, vfs, file_id_cache: FileIdCache::new() }
    }

    /// This back end always resolves ids directly (`getattr`/`readdir` take
    /// a bare `fileid3`, no path needed), so it always has `FileIdSupport`
    /// in the sense of §4.6/§4.12: a file-id cache miss never has to fall
    /// back to `STALE` the way a path-addressed back end without that
    /// capability would.
    pub fn supports_file_id_resolution(&self) -> bool {
        true
    }

    pub fn encode_directory_handle(&self, dirid: FileId) -> nfs3::nfs_fh3 {
        Handle::Directory(self.id, dirid).to_fh3()
    }

    pub fn encode_file_handle(&self, dirid: FileId, fileid: FileId) -> nfs3::nfs_fh3 {
        Handle::File(self.id, dirid, fileid).to_fh3()
    }

    pub fn encode_root_handle(&self) -> nfs3::nfs_fh3 {
        self.encode_directory_handle(self.vfs.root_dir())
    }

    /// Encodes the handle `MOUNT` hands back for this share: a bare
    /// `Share(shareId)` tag with no directory/file id, which `resolve`
    /// maps to the back end's own root directory on first use.
    pub fn encode_share_handle(&self) -> nfs3::nfs_fh3 {
        Handle::Share(self.id).to_fh3()
    }
}

/// Server-instance-wide lookup of shares by name and by id (§3, §4.13).
///
/// A background *share rescan* (§4.13) calls [`ShareRegistry::insert`]
/// again for shares already present; insertion is idempotent on name (the
/// existing `Share`, with its live file-id cache, is kept).
pub struct ShareRegistry {
    by_id: RwLock<HashMap<ShareId, Arc<Share>>>,
    by_name: RwLock<HashMap<String, Arc<Share>>>,
}

impl Default for ShareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareRegistry {
    pub fn new() -> Self {
        ShareRegistry { by_id: RwLock::new(HashMap::new()), by_name: RwLock::new(HashMap::new()) }
    }

    /// Inserts a share, doing nothing if a share of the same name is
    /// already registered (this is what makes a periodic rescan a no-op
    /// for shares that haven't changed).
    pub fn insert(&self, share: Share) -> Arc<Share> {
        let share = Arc::new(share);
        let mut by_name = self.by_name.write().unwrap();
        if let Some(existing) = by_name.get(&share.name) {
            return existing.clone();
        }
        by_name.insert(share.name.clone(), share.clone());
        self.by_id.write().unwrap().insert(share.id, share.clone());
        share
    }

    pub fn by_id(&self, id: ShareId) -> Option<Arc<Share>> {
        self.by_id.read().unwrap().get(&id).cloned()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Share>> {
        self.by_name.read().unwrap().get(name).cloned()
    }

    pub fn shares(&self) -> Vec<Arc<Share>> {
        self.by_id.read().unwrap().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_id_cache_rename_preserves_id_under_new_path() {
        let cache = FileIdCache::new();
        cache.insert_if_absent(42, "/a.txt");
        cache.remove_path("/a.txt");
        cache.reassociate(42, "/b.txt");
        assert_eq!(cache.id_for_path("/b.txt"), Some(42));
        assert_eq!(cache.id_for_path("/a.txt"), None);
        assert_eq!(cache.path_for_id(42), Some("/b.txt".to_string()));
    }

    #[test]
    fn file_id_cache_insert_if_absent_keeps_first_path() {
        let cache = FileIdCache::new();
        cache.insert_if_absent(1, "/first");
        cache.insert_if_absent(1, "/second");
        assert_eq!(cache.path_for_id(1), Some("/first".to_string()));
    }

    #[test]
    fn share_ids_are_stable_and_nonzero() {
        let a = hash_share_name("/export");
        let b = hash_share_name("/export");
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }
}
