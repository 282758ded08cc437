//! Implementation of the DUMP procedure (procedure 2) for MOUNT version 3 protocol
//! as defined in RFC 1813 Appendix I section I.4.3.
//!
//! DUMP takes no arguments and returns the list of `(client host, dirpath)`
//! pairs recorded by every successful `MNT` this server has served and not
//! yet `UMNT`ed, per `context.mount_entries`.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::mount::mountbody;
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_dump(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let entries = context.mount_entries.entries();
    debug!("mountproc3_dump({:?}) -> {} entries", xid, entries.len());

    let mut list_head = None;
    for (host, dirpath) in entries.into_iter().rev() {
        list_head = Some(mountbody {
            ml_hostname: host.into_bytes(),
            ml_directory: dirpath.into_bytes(),
            ml_next: Box::new(list_head),
        });
    }

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    list_head.serialize(output)?;
    Ok(())
}
