//! Reports host filesystem statistics for the overlay.

use crate::fuse::{Errno, OpResult, RequestContext, StatvfsData, ROOT_VNODE};

use super::{host, Fusebox};

impl Fusebox {
    /// Host statistics for the source root, with `namemax` shortened by
    /// the source prefix so composed paths never exceed host limits.
    pub async fn statfs(&mut self, _ctx: &RequestContext) -> OpResult<StatvfsData> {
        let root = self.vm.record(ROOT_VNODE)?.path().ok_or(Errno::NOENT)?.clone();
        let mut stat = host::statvfs(&root).await?;
        stat.f_namemax = stat.f_namemax.saturating_sub(root.as_os_str().len() as u64 + 1);
        Ok(stat)
    }
}
