//! Server-wide configuration surface.
//!
//! Mirrors the small set of options a deployer actually needs to tune: bind
//! ports, worker pool sizing, packet pool sizing, the maximum accepted
//! request size, and a bitset of debug trace categories. None of this is
//! persisted; it is supplied once at process start (see `lifecycle::Server`).

use std::fmt;

/// Default NFS/MOUNT port. Real deployments typically run privileged (2049);
/// tests bind to an ephemeral port instead.
pub const DEFAULT_NFS_PORT: u16 = 2049;

/// Default size of the worker pool (§4.4).
pub const DEFAULT_THREAD_POOL_SIZE: usize = 8;
/// Worker pool floor (§4.4).
pub const MIN_THREAD_POOL_SIZE: usize = 4;
/// Worker pool ceiling (§4.4).
pub const MAX_THREAD_POOL_SIZE: usize = 50;

/// Default maximum RPC request size in bytes (§4.3, §6).
pub const DEFAULT_MAX_REQUEST_SIZE: u32 = 65_535;

/// Default number of per-session search slots (§4.9).
pub const DEFAULT_SEARCH_SLOTS: usize = 256;

/// Bitset of debug trace categories, gating `tracing` verbosity only -
/// never correctness. Named after the categories in `SPEC_FULL.md` §10.3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags(u16);

impl DebugFlags {
    pub const RXDATA: DebugFlags = DebugFlags(1 << 0);
    pub const TXDATA: DebugFlags = DebugFlags(1 << 1);
    pub const DUMPDATA: DebugFlags = DebugFlags(1 << 2);
    pub const SEARCH: DebugFlags = DebugFlags(1 << 3);
    pub const INFO: DebugFlags = DebugFlags(1 << 4);
    pub const FILE: DebugFlags = DebugFlags(1 << 5);
    pub const FILEIO: DebugFlags = DebugFlags(1 << 6);
    pub const ERROR: DebugFlags = DebugFlags(1 << 7);
    pub const TIMING: DebugFlags = DebugFlags(1 << 8);
    pub const DIRECTORY: DebugFlags = DebugFlags(1 << 9);
    pub const SESSION: DebugFlags = DebugFlags(1 << 10);

    pub const NONE: DebugFlags = DebugFlags(0);

    pub fn contains(self, other: DebugFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DebugFlags {
    type Output = DebugFlags;
    fn bitor(self, rhs: DebugFlags) -> DebugFlags {
        DebugFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for DebugFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Server-wide configuration. Construct with [`ServerConfig::builder`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP and UDP port the NFS program binds to.
    pub nfs_port: u16,
    /// TCP port the MOUNT program binds to (C14). Usually the same as `nfs_port`.
    pub mount_port: u16,
    /// Port of the external portmapper to register with, or `None` to disable
    /// registration entirely (the "-1" sentinel in the distilled spec).
    pub portmapper_port: Option<u16>,
    /// Loopback host used to reach the portmapper for `PMAPPROC_SET`/`UNSET`.
    pub rpc_register_host: String,
    /// Worker pool size (§4.4), clamped to `[MIN_THREAD_POOL_SIZE, MAX_THREAD_POOL_SIZE]`.
    pub thread_pool_size: usize,
    /// Packet pool size hint (§4.2): number of buffers retained per size class.
    pub packet_pool_size: usize,
    /// Maximum accepted RPC request size in bytes (§4.3).
    pub max_request_size: u32,
    /// Per-session search slot count (§4.9).
    pub search_slots: usize,
    /// Trace verbosity bitset.
    pub debug_flags: DebugFlags,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            nfs_port: DEFAULT_NFS_PORT,
            mount_port: DEFAULT_NFS_PORT,
            portmapper_port: Some(111),
            rpc_register_host: "127.0.0.1".to_string(),
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            packet_pool_size: 64,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            search_slots: DEFAULT_SEARCH_SLOTS,
            debug_flags: DebugFlags::NONE,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder { inner: ServerConfig::default() }
    }
}

/// Builder for [`ServerConfig`], following the same fluent-setter idiom used
/// by `tcp::NFSTcpListener::with_export_name`.
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    inner: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn nfs_port(mut self, port: u16) -> Self {
        self.inner.nfs_port = port;
        self
    }

    pub fn mount_port(mut self, port: u16) -> Self {
        self.inner.mount_port = port;
        self
    }

    pub fn portmapper_port(mut self, port: Option<u16>) -> Self {
        self.inner.portmapper_port = port;
        self
    }

    pub fn rpc_register_host<S: Into<String>>(mut self, host: S) -> Self {
        self.inner.rpc_register_host = host.into();
        self
    }

    pub fn thread_pool_size(mut self, size: usize) -> Self {
        self.inner.thread_pool_size =
            size.clamp(MIN_THREAD_POOL_SIZE, MAX_THREAD_POOL_SIZE);
        self
    }

    pub fn packet_pool_size(mut self, size: usize) -> Self {
        self.inner.packet_pool_size = size;
        self
    }

    pub fn max_request_size(mut self, size: u32) -> Self {
        self.inner.max_request_size = size;
        self
    }

    pub fn debug_flags(mut self, flags: DebugFlags) -> Self {
        self.inner.debug_flags = flags;
        self
    }

    pub fn build(self) -> ServerConfig {
        self.inner
    }
}
