//! Resolves a name inside a parent directory to an attribute reply.

use std::ffi::OsStr;

use tracing::debug;

use crate::fuse::{EntryAttributes, Errno, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    /// Resolve `name` under `parent`, materializing a record on first
    /// sight and taking a kernel lookup reference.
    pub async fn lookup(
        &mut self,
        parent: Vnode,
        name: &OsStr,
        _ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        let path = self.resolve_child(parent, name).await?;
        debug!(target: "fusebox::operation", "lookup called with path <{}>", path.display());

        let existing = self.vm.vnode_by_path(&path);
        let pseudo = existing
            .and_then(|vnode| self.vm.record(vnode).ok())
            .map(|record| record.is_pseudo())
            .unwrap_or(false);
        if !pseudo && tokio::fs::symlink_metadata(&path).await.is_err() {
            return Err(Errno::NOENT);
        }

        let vnode = match existing {
            Some(vnode) => vnode,
            None => self.vm.create_physical(),
        };
        if name != OsStr::new(".") && name != OsStr::new("..") {
            self.vm.add_path(vnode, &path, true);
        }
        self.attrs_for(vnode).await
    }
}
