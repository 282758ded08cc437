//! Implementation of the LINK procedure (procedure 15) for NFS version 3 protocol
//! as defined in RFC 1813 section 3.3.15.
//!
//! The LINK procedure creates a hard link from one file to another. A hard link
//! is a second directory entry referring to the same file with an identical
//! file system object.
//!
//! The client specifies:
//! - The file handle for the existing file (target)
//! - The directory file handle and name for the new link (where to create the link)
//!
//! On successful return, the server provides:
//! - The file attributes of the target file after the operation
//! - The attributes of the directory before and after the operation (weak cache consistency)
//!
//! Hard links can be created only within a single file system (volume).
//!
//! This server never exposes hard-link creation: every call fails with
//! `NFS3ERR_ACCES` regardless of whether the named file and directory
//! resolve, matching the gateway this protocol surface sits in front of,
//! which has no hard-link concept of its own to map this onto.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Handles NFSv3 LINK procedure (procedure 15)
///
/// Always fails with `NFS3ERR_ACCES` (§4.11 row 15); the arguments are
/// still decoded so a malformed call is rejected the same way a supported
/// procedure would reject one.
///
/// # Returns
///
/// * `Result<(), anyhow::Error>` - Ok(()) on success or an error
pub async fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    _context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::LINK3args>(input)?;
    debug!("nfsproc3_link({:?}, {:?}) -- always NFS3ERR_ACCES", xid, args);

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_ACCES.serialize(output)?;
    nfs3::post_op_attr::None.serialize(output)?;
    nfs3::wcc_data::default().serialize(output)?;
    Ok(())
}
