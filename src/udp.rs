//! UDP datagram framing (C3): one datagram is one complete RPC message, with
//! no record marking, and the reply is sent back as a single datagram to
//! whichever address sent the request (§4.3: "one datagram = one RPC
//! message ... the response is sent as a single datagram").
//!
//! `tcp::NFSTcpListener` pegs one long-lived `Context` to each accepted
//! connection and lets `protocol::rpc::wire::SocketMessageHandler` pipeline
//! several record-marked requests over it. UDP has no connection to peg a
//! `Context` to, so this listener builds one fresh per datagram (carrying
//! that datagram's source address) and calls the same
//! `protocol::rpc::handle_rpc` the TCP path uses, skipping only the
//! record-marking and duplex-stream/command-queue plumbing TCP needs for
//! pipelining multiple requests over one socket.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{ServerConfig, DEFAULT_SEARCH_SLOTS};
use crate::pool::PacketPool;
use crate::protocol::nfs::mount::MountEntryTable;
use crate::protocol::nfs::portmap::PortmapTable;
use crate::protocol::rpc;
use crate::protocol::xdr;
use crate::session::SessionTable;
use crate::share::{Share, ShareRegistry};
use crate::vfs::NFSFileSystem;
use crate::worker::WorkerPool;

/// Maximum single-datagram RPC message size (§4.3, §6's "maximum message
/// size 65535 bytes").
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// NFS UDP listener (C3): binds one socket and serves it from a single
/// receive loop, dispatching each datagram through `rpc::handle_rpc` on its
/// own spawned task so that one slow back-end call can't stall datagrams
/// from other clients.
pub struct NFSUdpListener<T: NFSFileSystem + Send + Sync + 'static> {
    socket: Arc<tokio::net::UdpSocket>,
    port: u16,
    arcfs: Arc<T>,
    export_name: Arc<String>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
    portmap_table: Arc<RwLock<PortmapTable>>,
    share_registry: Arc<ShareRegistry>,
    session_table: Arc<SessionTable>,
    mount_entries: Arc<MountEntryTable>,
    write_verifier: xdr::nfs3::writeverf3,
    config: Arc<ServerConfig>,
    /// Bounded buffer pool (C2): every received datagram is copied into a
    /// buffer on loan from here rather than a fresh heap allocation, and the
    /// loan is released back to its size class once the reply has been sent.
    packet_pool: Arc<PacketPool>,
    /// Fixed-size worker pool (C4): each datagram's RPC processing is a job
    /// submitted to this pool rather than an unbounded `tokio::spawn`, so
    /// the number of datagrams being worked on concurrently is bounded by
    /// `config.thread_pool_size` the same way TCP's per-connection
    /// processing is (see `tcp::NFSTcpListener`).
    worker_pool: Arc<WorkerPool>,
}

impl<T: NFSFileSystem + Send + Sync + 'static> NFSUdpListener<T> {
    /// Binds a UDP socket to `ipstr` ("ip:port"), mirroring
    /// `tcp::NFSTcpListener::bind`'s signature so the two transports can be
    /// stood up identically by an embedder.
    pub async fn bind(ipstr: &str, fs: T) -> io::Result<NFSUdpListener<T>> {
        let socket = tokio::net::UdpSocket::bind(ipstr).await?;
        info!("UDP listening on {:?}", ipstr);
        let port = match socket.local_addr()? {
            SocketAddr::V4(s) => s.port(),
            SocketAddr::V6(s) => s.port(),
        };
        let config = Arc::new(ServerConfig::default());
        Ok(NFSUdpListener {
            socket: Arc::new(socket),
            port,
            arcfs: Arc::new(fs),
            export_name: Arc::from("/".to_string()),
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(Duration::from_secs(60))),
            portmap_table: Arc::from(RwLock::from(PortmapTable::default())),
            share_registry: Arc::new(ShareRegistry::new()),
            session_table: Arc::new(SessionTable::new(DEFAULT_SEARCH_SLOTS)),
            mount_entries: Arc::new(MountEntryTable::new()),
            write_verifier: crate::verifier::generate(),
            packet_pool: Arc::new(PacketPool::new(config.packet_pool_size)),
            worker_pool: Arc::new(WorkerPool::new(config.thread_pool_size)),
            config,
        })
    }

    pub fn get_listen_port(&self) -> u16 {
        self.port
    }

    /// Sets the NFS export name, same normalization as
    /// `tcp::NFSTcpListener::with_export_name`.
    pub fn with_export_name<S: AsRef<str>>(&mut self, export_name: S) {
        self.export_name = Arc::new(format!(
            "/{}",
            export_name.as_ref().trim_end_matches('/').trim_start_matches('/')
        ));
    }

    /// Registers the single back end this listener was bound with under its
    /// current export name, if not already present. Idempotent, so calling
    /// it on every `handle_forever` invocation costs nothing once the share
    /// already exists.
    fn ensure_share(&self) {
        if self.share_registry.by_name(&self.export_name).is_none() {
            self.share_registry.insert(Share::new((*self.export_name).clone(), self.arcfs.clone()));
        }
    }

    /// Receives datagrams forever, processing each one on its own spawned
    /// task. Unlike TCP, a UDP "connection" is only ever a source address:
    /// there is no socket to close and thus no moment to remove a session
    /// from `session_table`, so UDP-only sessions persist for the server's
    /// lifetime, per §4.5.
    pub async fn handle_forever(&self) -> io::Result<()> {
        self.ensure_share();
        loop {
            // Borrow a buffer from the packet pool (C2) for this datagram
            // instead of a fresh heap allocation; it is dropped (and thus
            // returned to its size class) once the spawned job finishes.
            let mut datagram = self.packet_pool.acquire(MAX_DATAGRAM_SIZE);
            datagram.resize(MAX_DATAGRAM_SIZE, 0);
            let (len, peer) = self.socket.recv_from(&mut datagram).await?;
            datagram.truncate(len);
            let context = rpc::Context {
                local_port: self.port,
                client_addr: peer.to_string(),
                auth: xdr::rpc::auth_unix::default(),
                mount_signal: None,
                transaction_tracker: self.transaction_tracker.clone(),
                portmap_table: self.portmap_table.clone(),
                share_registry: self.share_registry.clone(),
                session_table: self.session_table.clone(),
                mount_entries: self.mount_entries.clone(),
                session: None,
                write_verifier: self.write_verifier,
                config: self.config.clone(),
                last_session: Arc::new(Mutex::new(None)),
            };
            let socket = self.socket.clone();
            // Submitted to the worker pool (C4) rather than an unbounded
            // `tokio::spawn`, so the number of datagrams processed at once
            // is bounded by `config.thread_pool_size`; if every worker is
            // busy the job queues rather than adding unbounded concurrency.
            let submitted = self.worker_pool.submit(async move {
                let mut input = io::Cursor::new(&datagram[..]);
                let mut output = Vec::new();
                match rpc::handle_rpc(&mut input, &mut output, context).await {
                    Ok(true) => {
                        if let Err(e) = socket.send_to(&output, peer).await {
                            error!("UDP send error to {}: {:?}", peer, e);
                        }
                    }
                    Ok(false) => {
                        debug!("UDP retransmission dropped from {}", peer);
                    }
                    Err(e) => {
                        error!("UDP RPC handling error from {}: {:?}", peer, e);
                    }
                }
            });
            if submitted.is_err() {
                error!("worker pool shut down, dropping datagram from {}", peer);
            }
        }
    }
}
