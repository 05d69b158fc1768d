//! Renames overlay objects, keeping vnode identity stable.

use std::ffi::OsStr;

use tracing::info;

use crate::fuse::{Errno, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    /// Rename on the host, then move the path binding to the surviving
    /// record without touching its refcount. Descendant paths of a
    /// renamed directory become stale and self-evict on their next
    /// query.
    pub async fn rename(
        &mut self,
        old_parent: Vnode,
        old_name: &OsStr,
        new_parent: Vnode,
        new_name: &OsStr,
        _flags: u32,
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let path_old = self.resolve_child(old_parent, old_name).await?;
        let path_new = self.resolve_child(new_parent, new_name).await?;
        if !self.auditor.ask_writable(&path_new) {
            return Err(Errno::ACCES);
        }
        tokio::fs::rename(&path_old, &path_new).await?;
        info!(target: "fusebox::access", "RENAME: {} -> {}", path_old.display(), path_new.display());
        if let Some(vnode) = self.vm.vnode_by_path(&path_old) {
            self.vm.add_path(vnode, &path_new, false);
            self.vm.remove_path(vnode, &path_old);
        }
        Ok(())
    }
}
