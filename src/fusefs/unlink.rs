//! Unlinks files, subject to policy.

use std::ffi::OsStr;

use tracing::info;

use crate::fuse::{Errno, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    /// Remove one name of a file. The record keeps its other hard-link
    /// paths; when the last one goes and no descriptor is open, the
    /// record drops.
    pub async fn unlink(
        &mut self,
        parent: Vnode,
        name: &OsStr,
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let path = self.resolve_child(parent, name).await?;
        if !self.auditor.ask_writable(&path) {
            return Err(Errno::ACCES);
        }
        if self.auditor.ask_discard(&path) {
            info!(target: "fusebox::access", "UNLINK (discarded): {}", path.display());
            return Ok(());
        }
        tokio::fs::remove_file(&path).await?;
        if let Some(vnode) = self.vm.vnode_by_path(&path) {
            self.vm.remove_path(vnode, &path);
        }
        info!(target: "fusebox::access", "UNLINK: {}", path.display());
        Ok(())
    }
}
