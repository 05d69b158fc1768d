//! Releases kernel lookup references in batches.

use crate::fuse::Vnode;

use super::Fusebox;

impl Fusebox {
    /// Drop `nlookup` references per vnode. Records already gone are
    /// skipped: the kernel may batch forgets for vnodes the manager
    /// dropped on an earlier pair.
    pub async fn forget(&mut self, pairs: &[(Vnode, u64)]) {
        for &(vnode, nlookup) in pairs {
            if self.vm.contains_vnode(vnode) {
                self.vm.forget_reference(vnode, nlookup);
            }
        }
    }
}
