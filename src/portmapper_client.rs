//! Outbound portmapper client (C10): registers this server's `(program,
//! version, proto, port)` mappings with an external rpcbind/portmapper at
//! start, and withdraws them at stop (§4.10).
//!
//! This is a *client* of the portmap protocol, distinct from
//! `protocol::nfs::portmap`, which is this server's own portmap protocol
//! *responder*. Grounded on the same RPC call framing already used to talk
//! to this server (`protocol::xdr::rpc::call_body`, `protocol::rpc::wire`'s
//! record marking) - a `PMAPPROC_SET` is just a `call_body` with
//! `prog = portmap::PROGRAM` carrying a serialized `mapping` as its
//! arguments, sent over a loopback TCP connection and read back with the
//! same fragment framing the server uses to read requests.

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{anyhow, Context as _};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::protocol::xdr::rpc::{
    accept_body, auth_flavor, call_body, opaque_auth, reply_body, rpc_body, rpc_msg,
};
use crate::protocol::xdr::{deserialize, portmap, Serialize};

/// Serialises register/unregister calls across every protocol server on the
/// host sharing this process's portmapper client, per §4.10's "a process-wide
/// lock serialises register/unregister across all protocol servers sharing
/// the host".
static REGISTRATION_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

static NEXT_XID: AtomicU32 = AtomicU32::new(1);

fn next_xid() -> u32 {
    NEXT_XID.fetch_add(1, Ordering::Relaxed)
}

/// One `(program, version, proto, port)` mapping this server wants
/// registered with the portmapper.
#[derive(Debug, Clone, Copy)]
pub struct Mapping {
    pub program: u32,
    pub version: u32,
    pub proto: u32,
    pub port: u16,
}

impl Mapping {
    fn to_wire(self) -> portmap::mapping {
        portmap::mapping {
            prog: self.program,
            vers: self.version,
            prot: self.proto,
            port: u32::from(self.port),
        }
    }
}

/// Builds the NFSv3-over-TCP and NFSv3-over-UDP mappings this server
/// always registers (§4.10: "NFSv3 on TCP and UDP at minimum").
pub fn nfs_mappings(nfs_port: u16) -> Vec<Mapping> {
    vec![
        Mapping {
            program: crate::protocol::xdr::nfs3::PROGRAM,
            version: crate::protocol::xdr::nfs3::VERSION,
            proto: portmap::IPPROTO_TCP,
            port: nfs_port,
        },
        Mapping {
            program: crate::protocol::xdr::nfs3::PROGRAM,
            version: crate::protocol::xdr::nfs3::VERSION,
            proto: portmap::IPPROTO_UDP,
            port: nfs_port,
        },
    ]
}

/// Builds the MOUNT-over-TCP mapping (§4.14).
pub fn mount_mappings(mount_port: u16) -> Vec<Mapping> {
    vec![Mapping {
        program: crate::protocol::xdr::mount::PROGRAM,
        version: crate::protocol::xdr::mount::VERSION,
        proto: portmap::IPPROTO_TCP,
        port: mount_port,
    }]
}

async fn call(host: &str, port: u16, proc: u32, args: &portmap::mapping) -> anyhow::Result<bool> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to portmapper at {host}:{port}"))?;

    let xid = next_xid();
    let msg = rpc_msg {
        xid,
        body: rpc_body::CALL(call_body {
            rpcvers: 2,
            prog: portmap::PROGRAM,
            vers: portmap::VERSION,
            proc,
            cred: opaque_auth { flavor: auth_flavor::AUTH_NULL, body: Vec::new() },
            verf: opaque_auth { flavor: auth_flavor::AUTH_NULL, body: Vec::new() },
        }),
    };

    let mut buf = Vec::new();
    msg.serialize(&mut buf)?;
    args.serialize(&mut buf)?;

    let header = (buf.len() as u32) | (1 << 31);
    stream.write_all(&header.to_be_bytes()).await?;
    stream.write_all(&buf).await?;
    stream.flush().await?;

    let mut header_buf = [0_u8; 4];
    stream.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) != 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    if !is_last {
        return Err(anyhow!("portmapper reply spanned multiple fragments, unsupported"));
    }
    let mut reply_buf = vec![0_u8; length];
    stream.read_exact(&mut reply_buf).await?;

    let reply = deserialize::<rpc_msg>(&mut Cursor::new(&reply_buf))?;
    if reply.xid != xid {
        return Err(anyhow!("portmapper reply xid {} != request xid {}", reply.xid, xid));
    }
    match reply.body {
        rpc_body::REPLY(reply_body::MSG_ACCEPTED(accepted)) => match accepted.reply_data {
            accept_body::SUCCESS => Ok(true),
            other => Err(anyhow!("portmapper call rejected: {other:?}")),
        },
        rpc_body::REPLY(reply_body::MSG_DENIED(denied)) => {
            Err(anyhow!("portmapper call denied: {denied:?}"))
        }
        rpc_body::CALL(_) => Err(anyhow!("portmapper sent a CALL instead of a REPLY")),
    }
}

/// Registers every mapping with the portmapper at `host:port`, logging (but
/// not propagating) individual failures, per §4.10: "Failures are logged and
/// do not abort startup."
pub async fn register_all(host: &str, port: u16, mappings: &[Mapping]) {
    let _guard = REGISTRATION_LOCK.lock().await;
    for mapping in mappings {
        if let Err(err) = call(host, port, portmap::PortmapProgram::PMAPPROC_SET as u32, &mapping.to_wire()).await
        {
            warn!(
                program = mapping.program,
                version = mapping.version,
                proto = mapping.proto,
                port = mapping.port,
                error = %err,
                "portmapper registration failed"
            );
        }
    }
}

/// Withdraws every mapping from the portmapper at `host:port`, same
/// log-and-continue failure policy as `register_all`.
pub async fn unregister_all(host: &str, port: u16, mappings: &[Mapping]) {
    let _guard = REGISTRATION_LOCK.lock().await;
    for mapping in mappings {
        if let Err(err) =
            call(host, port, portmap::PortmapProgram::PMAPPROC_UNSET as u32, &mapping.to_wire()).await
        {
            warn!(
                program = mapping.program,
                version = mapping.version,
                proto = mapping.proto,
                port = mapping.port,
                error = %err,
                "portmapper deregistration failed"
            );
        }
    }
}
