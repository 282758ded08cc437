//! Shared handle resolution for the NFSv3 procedure handlers (C6/C7): every
//! handler decodes its incoming `nfs_fh3` through [`resolve`] instead of
//! talking to a single process-wide VFS, so that each request is routed to
//! the particular [`Share`] (and thus the particular back end) its handle
//! names, and encodes reply handles through [`encode_handle`] so the
//! share id travels with every handle the client is handed back.

use std::sync::Arc;

use crate::handle::Handle;
use crate::protocol::rpc;
use crate::protocol::xdr::nfs3;
use crate::share::Share;

/// Decodes `fh`, looks up the share it names in `context.share_registry`,
/// and returns that share together with the back-end object id the handle
/// addresses. A `Share`-tagged handle (the value returned by MOUNT) resolves
/// to the back end's own root directory id.
pub fn resolve(
    context: &rpc::Context,
    fh: &nfs3::nfs_fh3,
) -> Result<(Arc<Share>, nfs3::fileid3), nfs3::nfsstat3> {
    let handle = Handle::from_fh3(fh).map_err(nfs3::nfsstat3::from)?;
    let share = context
        .share_registry
        .by_id(handle.share_id())
        .ok_or(nfs3::nfsstat3::NFS3ERR_BADHANDLE)?;
    let id = handle.object_id().unwrap_or_else(|| share.vfs.root_dir());
    Ok((share, id))
}

/// Encodes a reply handle for `id`, discovered within `dirid`, picking the
/// `Directory` or `File` handle tag to match `ftype` (§3: only directories
/// get a `Directory`-tagged handle, everything else - regular files,
/// symlinks, devices - gets a `File`-tagged one).
pub fn encode_handle(
    share: &Share,
    dirid: nfs3::fileid3,
    id: nfs3::fileid3,
    ftype: nfs3::ftype3,
) -> nfs3::nfs_fh3 {
    if matches!(ftype, nfs3::ftype3::NF3DIR) {
        share.encode_directory_handle(id)
    } else {
        share.encode_file_handle(dirid, id)
    }
}
