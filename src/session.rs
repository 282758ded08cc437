//! Session table (C5): sessions are keyed on an identity derived from the
//! RPC credential (§4.5), not on the transport connection, so a UDP client
//! making two unrelated calls and a TCP client reconnecting both land on
//! the same `Session` as long as their credentials hash the same way.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crate::handle::ShareId;
use crate::openfile::OpenFileCache;
use crate::search::SearchSlotTable;
use crate::share::AccessPermission;

/// The authentication class a session was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthClass {
    None,
    Unix,
}

/// Information about the client gathered at authentication time, via the
/// authenticator collaborator (§6).
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
    pub address: String,
}

/// Hashes a client address into the 32-bit quantity §4.5 calls
/// `hash(clientAddress)`. Not cryptographic; a `DefaultHasher` digest is
/// exactly the kind of "good enough to bucket clients" hash the source
/// system used, and matches `share::hash_share_name`'s approach.
fn hash_addr(addr: &str) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    addr.hash(&mut hasher);
    hasher.finish() as u32
}

/// Computes the session table key for a credential, per §4.5:
/// - `AUTH_NONE`: `hash(clientAddress)`
/// - `AUTH_UNIX`: `(hash(clientAddress) << 32) | (gid << 16) | uid`
///
/// §9 Open Question 3 notes that keying on address hash alone collides
/// across NATed clients; this implementation keeps the spec's documented
/// (if imperfect) key rather than substituting a transport-session id, so
/// that two NATed `AUTH_NONE` clients sharing a public address intentionally
/// share a session, matching the legacy behavior being reproduced.
pub fn auth_identity(class: AuthClass, addr: &str, uid: u32, gid: u32) -> u64 {
    let addr_hash = u64::from(hash_addr(addr));
    match class {
        AuthClass::None => addr_hash,
        AuthClass::Unix => {
            (addr_hash << 32) | ((u64::from(gid) & 0xFFFF) << 16) | u64::from(uid & 0xFFFF)
        }
    }
}

/// One authenticated RPC caller (§3).
pub struct Session {
    pub session_id: u64,
    pub auth_class: AuthClass,
    pub client_info: ClientInfo,
    pub open_files: OpenFileCache,
    pub search_slots: SearchSlotTable,
    tree_connections: RwLock<HashMap<ShareId, AccessPermission>>,
    log_id: String,
}

impl Session {
    fn new(session_id: u64, auth_class: AuthClass, client_info: ClientInfo, search_slots: usize) -> Self {
        let log_id = format!("sess-{session_id:016x}");
        Session {
            session_id,
            auth_class,
            client_info,
            open_files: OpenFileCache::new(),
            search_slots: SearchSlotTable::new(search_slots),
            tree_connections: RwLock::new(HashMap::new()),
            log_id,
        }
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// Returns this session's granted permission for `share_id`, creating
    /// the tree connection lazily with `default_permission` (normally
    /// `ReadWrite`, per §3's "defaulting to ReadWrite when absent") if this
    /// is the first reference.
    pub fn tree_connection(&self, share_id: ShareId, default_permission: AccessPermission) -> AccessPermission {
        if let Some(perm) = self.tree_connections.read().unwrap().get(&share_id) {
            return *perm;
        }
        *self
            .tree_connections
            .write()
            .unwrap()
            .entry(share_id)
            .or_insert(default_permission)
    }
}

/// Maps authentication identity -> `Session`, protected by one lock for the
/// whole table (§5: "session tables are protected by a single lock per
/// table").
pub struct SessionTable {
    sessions: Mutex<HashMap<u64, std::sync::Arc<Session>>>,
    next_session_id: AtomicU64,
    search_slots_per_session: usize,
}

impl SessionTable {
    pub fn new(search_slots_per_session: usize) -> Self {
        SessionTable {
            sessions: Mutex::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
            search_slots_per_session,
        }
    }

    /// Resolves the session for a credential, constructing one via
    /// `build_client_info` on cache miss (§4.5). Sessions are never evicted
    /// on a timer; callers remove them explicitly when a TCP connection
    /// closes (`remove`).
    pub fn get_or_create(
        &self,
        class: AuthClass,
        addr: &str,
        uid: u32,
        gid: u32,
        build_client_info: impl FnOnce() -> ClientInfo,
    ) -> std::sync::Arc<Session> {
        let key = auth_identity(class, addr, uid, gid);
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get(&key) {
            return session.clone();
        }
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = std::sync::Arc::new(Session::new(
            session_id,
            class,
            build_client_info(),
            self.search_slots_per_session,
        ));
        sessions.insert(key, session.clone());
        session
    }

    /// Removes the session keyed by this credential, called when its TCP
    /// connection closes. UDP-only sessions are never removed this way and
    /// persist for the server lifetime, per §4.5.
    pub fn remove(&self, class: AuthClass, addr: &str, uid: u32, gid: u32) {
        let key = auth_identity(class, addr, uid, gid);
        self.sessions.lock().unwrap().remove(&key);
    }

    /// Removes whichever entry currently holds `session_id`, used when the
    /// caller only has the `Session` (and thus its id) rather than the raw
    /// credential that produced its key - e.g. a closing TCP connection
    /// that last saw this session.
    pub fn remove_session(&self, session_id: u64) {
        self.sessions.lock().unwrap().retain(|_, session| session.session_id != session_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_credential_reuses_session() {
        let table = SessionTable::new(256);
        let a = table.get_or_create(AuthClass::None, "10.0.0.1:111", 0, 0, ClientInfo::default);
        let b = table.get_or_create(AuthClass::None, "10.0.0.1:111", 0, 0, ClientInfo::default);
        assert_eq!(a.session_id, b.session_id);
    }

    #[test]
    fn distinct_uid_gives_distinct_unix_session() {
        let table = SessionTable::new(256);
        let a = table.get_or_create(AuthClass::Unix, "10.0.0.1:111", 1000, 100, ClientInfo::default);
        let b = table.get_or_create(AuthClass::Unix, "10.0.0.1:111", 1001, 100, ClientInfo::default);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn remove_drops_session_so_next_call_gets_a_new_one() {
        let table = SessionTable::new(256);
        let a = table.get_or_create(AuthClass::None, "10.0.0.1:111", 0, 0, ClientInfo::default);
        table.remove(AuthClass::None, "10.0.0.1:111", 0, 0);
        let b = table.get_or_create(AuthClass::None, "10.0.0.1:111", 0, 0, ClientInfo::default);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn tree_connection_defaults_and_is_sticky() {
        let session = Session::new(1, AuthClass::None, ClientInfo::default(), 8);
        assert_eq!(session.tree_connection(1, AccessPermission::ReadWrite), AccessPermission::ReadWrite);
        // a later call with a different default doesn't move a connection already established
        assert_eq!(session.tree_connection(1, AccessPermission::ReadOnly), AccessPermission::ReadWrite);
    }
}
