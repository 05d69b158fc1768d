//! Creates hard links, subject to policy.

use std::ffi::OsStr;

use tracing::info;

use crate::fuse::{EntryAttributes, Errno, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    /// Hard-link an existing record under a new name. The new path joins
    /// the record's path set with a kernel reference.
    pub async fn link(
        &mut self,
        vnode: Vnode,
        new_parent: Vnode,
        new_name: &OsStr,
        _ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        let path_new = self.resolve_child(new_parent, new_name).await?;
        if self.is_pseudo_path(&path_new) {
            return Err(Errno::ACCES);
        }
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Err(Errno::ACCES);
        }
        let path_src = record.path().ok_or(Errno::NOENT)?.clone();
        if !self.auditor.ask_writable(&path_new) {
            return Err(Errno::ACCES);
        }
        if self.auditor.ask_discard(&path_new) {
            info!(target: "fusebox::access", "LINK (discarded): {}", path_new.display());
            return Ok(self.null_attrs());
        }

        tokio::fs::hard_link(&path_src, &path_new).await?;
        self.vm.add_path(vnode, &path_new, true);
        info!(target: "fusebox::access", "LINK: {}", path_new.display());
        self.attrs_for(vnode).await
    }
}
