//! Creates special filesystem nodes, subject to policy.

use std::ffi::OsStr;

use tracing::info;

use crate::fuse::{EntryAttributes, Errno, OpResult, RequestContext, Vnode};

use super::{host, Fusebox};

impl Fusebox {
    pub async fn mknod(
        &mut self,
        parent: Vnode,
        name: &OsStr,
        mode: u32,
        rdev: u64,
        ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        let path = self.resolve_child(parent, name).await?;
        if self.is_pseudo_path(&path) {
            return Err(Errno::ACCES);
        }
        if !self.auditor.ask_writable(&path) {
            return Err(Errno::ACCES);
        }
        if self.auditor.ask_discard(&path) {
            info!(target: "fusebox::access", "MKNOD (discarded): {}", path.display());
            return Ok(self.null_attrs());
        }

        host::mknod(&path, mode & !ctx.umask, rdev).await?;
        host::chown(&path, ctx.uid as i64, ctx.gid as i64, false).await?;

        let vnode = self.vm.create_physical();
        self.vm.add_path(vnode, &path, true);
        info!(target: "fusebox::access", "MKNOD: {}", path.display());
        self.attrs_for(vnode).await
    }
}
