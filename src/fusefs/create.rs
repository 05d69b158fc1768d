//! Creates and opens files in one step, subject to policy.

use std::ffi::OsStr;
use std::path::Path;

use tracing::info;

use crate::fuse::{EntryAttributes, Errno, FileInfo, OpResult, RequestContext, Vnode};
use crate::vnode::FdParams;

use super::{open_with_flags, Fusebox};

impl Fusebox {
    /// Create `name` under `parent` and return an open handle plus the
    /// new entry's attributes.
    ///
    /// A discard-target create never touches the host path: the
    /// descriptor is backed by `/dev/null` and the path is bound to the
    /// null sink so later lookups keep resolving it.
    pub async fn create(
        &mut self,
        parent: Vnode,
        name: &OsStr,
        mode: u32,
        flags: i32,
        _ctx: &RequestContext,
    ) -> OpResult<(FileInfo, EntryAttributes)> {
        let path = self.resolve_child(parent, name).await?;
        if self.is_pseudo_path(&path) {
            return Err(Errno::ACCES);
        }
        if !self.auditor.ask_writable(&path) {
            info!(target: "fusebox::operation", "creating at path <{}> is not permitted", path.display());
            return Err(Errno::ACCES);
        }

        if self.auditor.ask_discard(&path) {
            info!(target: "fusebox::access", "CREATE (discarded): {}", path.display());
            let file = open_with_flags(Path::new("/dev/null"), flags, None).await?;
            let null = self.controllers().null;
            self.vm.add_path(null, &path, true);
            let fd = self.vm.open_fd(null, FdParams { path, flags, discard: false, file });
            return Ok((FileInfo { fh: fd }, self.null_attrs()));
        }

        let file = open_with_flags(&path, flags | libc::O_CREAT | libc::O_TRUNC, Some(mode)).await?;
        let vnode = self.vm.create_physical();
        self.vm.add_path(vnode, &path, true);
        let fd = self.vm.open_fd(vnode, FdParams { path: path.clone(), flags, discard: false, file });
        info!(target: "fusebox::access", "CREATE: {}", path.display());
        let attrs = self.attrs_for(vnode).await?;
        Ok((FileInfo { fh: fd }, attrs))
    }
}
