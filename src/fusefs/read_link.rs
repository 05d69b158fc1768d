//! Reads symbolic link targets.

use std::ffi::OsString;

use crate::fuse::{Errno, OpResult, RequestContext, Vnode};

use super::Fusebox;

impl Fusebox {
    pub async fn readlink(&mut self, vnode: Vnode, _ctx: &RequestContext) -> OpResult<OsString> {
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Err(Errno::INVAL);
        }
        let path = record.path().ok_or(Errno::NOENT)?.clone();
        let target = tokio::fs::read_link(&path).await?;
        Ok(target.into_os_string())
    }
}
