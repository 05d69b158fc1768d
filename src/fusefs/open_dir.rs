//! Opens directories for iteration.

use tracing::info;

use crate::fuse::{OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    /// Directories carry no host descriptor; the vnode itself is the
    /// directory handle passed back to `readdir`.
    pub async fn opendir(&mut self, vnode: Vnode, _ctx: &RequestContext) -> OpResult<Vnode> {
        let record = self.vm.get(vnode).await?;
        info!(target: "fusebox::access", "OPENDIR: {:?}", record.paths());
        Ok(vnode)
    }
}
