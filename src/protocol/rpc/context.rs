//! RPC context implementation for maintaining server and client state.
//!
//! The Context module provides the state management infrastructure needed for
//! handling RPC requests. It encapsulates all information required for:
//!
//! - Client identification and authentication
//! - Access to file system resources
//! - Tracking of client sessions and requests
//! - Mount status monitoring
//!
//! This module serves as a bridge between the RPC layer and the underlying
//! file system, providing each protocol handler with the information it needs
//! to process requests correctly in accordance with client permissions and
//! server configuration.

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::protocol::nfs::mount::MountEntryTable;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::xdr;
use crate::protocol::xdr::nfs3::writeverf3;
use crate::session::{Session, SessionTable};
use crate::share::ShareRegistry;

/// Represents the execution context for RPC operations
///
/// The Context structure encapsulates all the state information needed to process
/// an RPC request, including client identification, authentication credentials,
/// server configuration, and access to the virtual file system.
///
/// This context is passed to all protocol handlers (NFS, MOUNT, PORTMAP), providing
/// them with the information necessary to authenticate, authorize, and execute
/// requested operations. It serves as a bridge between the RPC layer and the
/// underlying file system implementation.
///
/// Each RPC connection maintains its own Context instance, ensuring proper isolation
/// between different client sessions and enabling accurate tracking of client state.
#[derive(Clone)]
pub struct Context {
    /// Port number on which the server is listening
    pub local_port: u16,

    /// Client's network address (IP:port) used for logging and request tracking
    pub client_addr: String,

    /// UNIX-style authentication credentials from the client
    /// Contains user ID, group IDs, and other identity information
    pub auth: xdr::rpc::auth_unix,

    /// Channel for sending mount/unmount notifications
    /// Used to track file system mount status changes
    pub mount_signal: Option<mpsc::Sender<bool>>,

    /// Transaction state tracker for handling retransmissions
    /// Maintains idempotency by detecting duplicate RPC calls
    pub transaction_tracker: Arc<super::TransactionTracker>,

    /// Portmap table storing port-to-program mappings
    /// (like a portmap service)
    pub portmap_table: Arc<RwLock<PortmapTable>>,

    /// Server-instance-wide share registry (C7): every export this server
    /// currently has mounted, keyed by name and by share id.
    pub share_registry: Arc<ShareRegistry>,

    /// Server-instance-wide record of successful `MNT`s not yet `UMNT`ed,
    /// consulted by `MOUNTPROC3_DUMP` and trimmed by `UMNT`/`UMNTALL`.
    pub mount_entries: Arc<MountEntryTable>,

    /// Server-instance-wide session table (C5), keyed by authentication
    /// identity.
    pub session_table: Arc<SessionTable>,

    /// The session resolved for the call currently being processed. `None`
    /// until `protocol::rpc::wire::handle_rpc` resolves it from `auth` and
    /// `client_addr`; every NFSv3 and MOUNT handler sees it populated.
    pub session: Option<Arc<Session>>,

    /// This process's write verifier (§3, §8 invariant 7), fixed for the
    /// life of the process and echoed on every `WRITE`/`COMMIT` reply.
    pub write_verifier: writeverf3,

    /// Server-wide tunables (§4 throughout).
    pub config: Arc<ServerConfig>,

    /// Shared with every per-request clone of this `Context` on the same
    /// connection: the most recently resolved session. `tcp::process_socket`
    /// reads this when the connection closes so it can drop the session
    /// from `session_table` (§4.5's "a session is removed when its TCP
    /// connection closes"); a bare `Context::session` clone wouldn't be
    /// visible back on the connection's own long-lived `Context` value.
    pub last_session: Arc<Mutex<Option<Arc<Session>>>>,
}

impl Context {
    /// Builds a `Context` with inert defaults for every field, for use by
    /// the integration test suite: each test overrides only the fields its
    /// scenario cares about via struct-update syntax.
    #[doc(hidden)]
    pub fn test_default() -> Context {
        Context {
            local_port: 0,
            client_addr: "0.0.0.0:0".to_string(),
            auth: xdr::rpc::auth_unix::default(),
            mount_signal: None,
            transaction_tracker: Arc::new(super::TransactionTracker::new(
                std::time::Duration::from_secs(60),
            )),
            portmap_table: Arc::new(RwLock::new(PortmapTable::default())),
            share_registry: Arc::new(ShareRegistry::new()),
            mount_entries: Arc::new(MountEntryTable::new()),
            session_table: Arc::new(SessionTable::new(crate::config::DEFAULT_SEARCH_SLOTS)),
            session: None,
            write_verifier: crate::verifier::generate(),
            config: Arc::new(ServerConfig::default()),
            last_session: Arc::new(Mutex::new(None)),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("auth", &self.auth)
            .finish()
    }
}
