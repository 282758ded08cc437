//! PORTMAP protocol implementation as specified in RFC 1057 A.1 and A.2 sections.
//! https://datatracker.ietf.org/doc/rfc1057/

use std::collections::HashMap;
use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::error;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, portmap, Serialize};

mod dump;
mod get_port;
mod null;
mod set_port;
mod unset_port;

/// Key a `(program, version, protocol)` mapping is registered under in
/// [`PortmapTable`] (§4.10/§6: the rpcbind tuple this server's own embedded
/// portmap responder tracks, distinct from `portmapper_client`'s outbound
/// registration with an *external* portmapper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortmapKey {
    pub prog: u32,
    pub vers: u32,
    pub prot: u32,
}

/// The table `PMAPPROC_SET`/`PMAPPROC_UNSET`/`PMAPPROC_DUMP`/`PMAPPROC_GETPORT`
/// read and mutate: program/version/protocol tuples mapped to the port
/// they were registered on. One instance lives in `rpc::Context`, shared
/// (via `Arc<RwLock<_>>`) by every connection this server accepts.
#[derive(Debug, Default)]
pub struct PortmapTable {
    pub table: HashMap<PortmapKey, u16>,
}

use dump::pmapproc_dump;
use get_port::pmapproc_getport;
use null::pmapproc_null;
use set_port::pmapproc_setport;
use unset_port::pmapproc_unsetport;

/// Main handler for PORTMAP protocol
///
/// TODO: PMAPPROC_CALLIT (forward a call to another registered RPC service)
/// is still unimplemented; no caller in this server has needed it so far.
///
/// # Arguments
///
/// * `xid` - RPC transaction ID from the client
/// * `call` - The RPC call body containing program, version, and procedure numbers
/// * `input` - Input stream for reading procedure arguments
/// * `output` - Output stream for writing procedure results
/// * `context` - Server context containing port information
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub fn handle_portmap(
    xid: u32,
    call: &xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &mut rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != portmap::VERSION {
        error!("Invalid Portmap Version number {} != {}", call.vers, portmap::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, portmap::VERSION).serialize(output)?;
        return Ok(());
    }
    let prog =
        portmap::PortmapProgram::from_u32(call.proc).unwrap_or(portmap::PortmapProgram::INVALID);

    match prog {
        portmap::PortmapProgram::PMAPPROC_NULL => pmapproc_null(xid, input, output)?,
        portmap::PortmapProgram::PMAPPROC_GETPORT => pmapproc_getport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_SET => pmapproc_setport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_UNSET => pmapproc_unsetport(xid, input, output, context)?,
        portmap::PortmapProgram::PMAPPROC_DUMP => pmapproc_dump(xid, output, context)?,
        _ => {
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
