//! Creates directories, subject to policy.

use std::ffi::OsStr;

use tracing::info;

use crate::fuse::{EntryAttributes, Errno, OpResult, RequestContext, Vnode};

use super::{host, Fusebox};

impl Fusebox {
    pub async fn mkdir(
        &mut self,
        parent: Vnode,
        name: &OsStr,
        mode: u32,
        ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        let path = self.resolve_child(parent, name).await?;
        if self.is_pseudo_path(&path) {
            return Err(Errno::ACCES);
        }
        if !self.auditor.ask_writable(&path) {
            info!(target: "fusebox::operation", "creating directory at path <{}> is not permitted", path.display());
            return Err(Errno::ACCES);
        }
        if self.auditor.ask_discard(&path) {
            info!(target: "fusebox::access", "MKDIR (discarded): {}", path.display());
            let mut attrs = self.null_attrs();
            attrs.st_mode = (attrs.st_mode & !libc::S_IFMT) | libc::S_IFDIR;
            return Ok(attrs);
        }

        let mut builder = tokio::fs::DirBuilder::new();
        builder.mode(mode & !ctx.umask);
        builder.create(&path).await?;
        host::chown(&path, ctx.uid as i64, ctx.gid as i64, true).await?;

        let vnode = self.vm.create_physical();
        self.vm.add_path(vnode, &path, true);
        info!(target: "fusebox::access", "MKDIR: {}", path.display());
        self.attrs_for(vnode).await
    }
}
