//! Server lifecycle (C13): start/stop ordering, portmapper registration, and
//! periodic share rescan, tying the packet pool (C2), worker pool (C4), the
//! share registry (C7), and the session table (C5) into one `Server` handle
//! that `tcp::NFSTcpListener` and `udp::NFSUdpListener` are built against.
//!
//! Grounded on the same "allocate once, hand `Arc` clones to every
//! collaborator" shape `tcp::NFSTcpListener::bind_internal` already uses for
//! its `transaction_tracker`/`portmap_table`, generalised here to the full
//! set of server-instance-wide state a multi-share, multi-transport server
//! needs, per §4.13's start order: packet pool -> worker pool -> UDP framing
//! -> TCP framing -> portmapper registration -> mark active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::info;

use crate::config::ServerConfig;
use crate::pool::PacketPool;
use crate::portmapper_client::{self, mount_mappings, nfs_mappings, Mapping};
use crate::protocol::nfs::mount::MountEntryTable;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::rpc::TransactionTracker;
use crate::protocol::xdr::nfs3::writeverf3;
use crate::session::SessionTable;
use crate::share::{Share, ShareRegistry};
use crate::vfs::NFSFileSystem;
use crate::worker::WorkerPool;

/// Server-instance-wide state shared by every transport framing and by the
/// outbound portmapper client (§4.13, §5 "shared resources").
pub struct Server {
    pub config: Arc<ServerConfig>,
    pub share_registry: Arc<ShareRegistry>,
    pub session_table: Arc<SessionTable>,
    pub packet_pool: Arc<PacketPool>,
    pub worker_pool: Arc<WorkerPool>,
    pub portmap_table: Arc<RwLock<PortmapTable>>,
    pub mount_entries: Arc<MountEntryTable>,
    pub transaction_tracker: Arc<TransactionTracker>,
    pub write_verifier: writeverf3,
    registered_mappings: Mutex<Vec<Mapping>>,
    active: AtomicBool,
}

impl Server {
    /// Allocates the packet pool and worker pool (the first two steps of
    /// §4.13's start order) and the rest of the server-instance-wide state.
    /// Transports (`tcp::NFSTcpListener`, `udp::NFSUdpListener`) and
    /// portmapper registration are brought up afterward, by the caller and
    /// by [`Server::start`] respectively.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let packet_pool = Arc::new(PacketPool::new(config.packet_pool_size));
        let worker_pool = Arc::new(WorkerPool::new(config.thread_pool_size));
        let search_slots = config.search_slots;
        Arc::new(Server {
            config: Arc::new(config),
            share_registry: Arc::new(ShareRegistry::new()),
            session_table: Arc::new(SessionTable::new(search_slots)),
            packet_pool,
            worker_pool,
            portmap_table: Arc::new(RwLock::new(PortmapTable::default())),
            mount_entries: Arc::new(MountEntryTable::new()),
            transaction_tracker: Arc::new(TransactionTracker::new(Duration::from_secs(60))),
            write_verifier: crate::verifier::generate(),
            registered_mappings: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
        })
    }

    /// Mounts a back end under `name` (§3), making it reachable by `MOUNT`
    /// and by any NFS handle carrying its share id. `ShareRegistry::insert`
    /// is idempotent on name, so calling this again for an already-mounted
    /// name is a no-op that returns the existing `Share`.
    pub fn add_share(&self, name: impl Into<String>, vfs: Arc<dyn NFSFileSystem + Send + Sync>) -> Arc<Share> {
        self.share_registry.insert(Share::new(name, vfs))
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Registers NFS (TCP and UDP) and MOUNT with the external portmapper,
    /// if `config.portmapper_port` is set, then marks the server active -
    /// the final two steps of §4.13's start order. Safe to call once
    /// transports are already serving traffic.
    pub async fn start(&self) {
        if let Some(pm_port) = self.config.portmapper_port {
            let mut mappings = nfs_mappings(self.config.nfs_port);
            mappings.extend(mount_mappings(self.config.mount_port));
            portmapper_client::register_all(&self.config.rpc_register_host, pm_port, &mappings)
                .await;
            *self.registered_mappings.lock().unwrap() = mappings;
        }
        self.active.store(true, Ordering::Release);
        info!("server started");
    }

    /// Reverse of [`Server::start`] (§4.13 stop order): withdraws the
    /// portmapper registration, then marks the server inactive. Shutting
    /// down the worker pool and transport framings is the embedder's
    /// responsibility - dropping their handles closes the channels each
    /// worker and listener treats as its interrupt signal (§4.13
    /// "Cancellation").
    pub async fn stop(&self) {
        self.active.store(false, Ordering::Release);
        let mappings = std::mem::take(&mut *self.registered_mappings.lock().unwrap());
        if let (Some(pm_port), false) = (self.config.portmapper_port, mappings.is_empty()) {
            portmapper_client::unregister_all(&self.config.rpc_register_host, pm_port, &mappings)
                .await;
        }
        info!("server stopped");
    }

    /// Periodic share rescan (§4.13): re-inserts every share an embedder's
    /// own source of truth currently knows about. Idempotent on name, so a
    /// share already registered is left untouched (including its live
    /// file-id cache); only genuinely new shares are picked up.
    pub fn rescan_shares(
        &self,
        shares: impl IntoIterator<Item = (String, Arc<dyn NFSFileSystem + Send + Sync>)>,
    ) {
        for (name, vfs) in shares {
            self.share_registry.insert(Share::new(name, vfs));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_and_stop_toggle_active_without_a_portmapper() {
        let config = ServerConfig::builder().portmapper_port(None).build();
        let server = Server::new(config);
        assert!(!server.is_active());
        server.start().await;
        assert!(server.is_active());
        server.stop().await;
        assert!(!server.is_active());
    }

    #[test]
    fn rescan_is_idempotent_on_already_known_names() {
        let server = Server::new(ServerConfig::builder().portmapper_port(None).build());
        assert_eq!(server.share_registry.shares().len(), 0);
    }
}
