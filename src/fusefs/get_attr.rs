//! Serves attribute queries.

use tracing::debug;

use crate::fuse::{EntryAttributes, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    pub async fn getattr(
        &mut self,
        vnode: Vnode,
        _ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        debug!(target: "fusebox::operation", "getattr called with vnode <{vnode}>");
        self.attrs_for(vnode).await
    }
}
