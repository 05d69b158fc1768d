//! Extended attribute operations.

use std::ffi::{OsStr, OsString};

use crate::fuse::{Errno, OpResult, RequestContext, Vnode};

use super::{host, Fusebox};

impl Fusebox {
    pub async fn getxattr(
        &mut self,
        vnode: Vnode,
        name: &OsStr,
        _ctx: &RequestContext,
    ) -> OpResult<Vec<u8>> {
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Err(Errno::NODATA);
        }
        let path = record.path().ok_or(Errno::NOENT)?.clone();
        host::getxattr(&path, name).await
    }

    pub async fn setxattr(
        &mut self,
        vnode: Vnode,
        name: &OsStr,
        value: &[u8],
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Err(Errno::ACCES);
        }
        let path = record.path().ok_or(Errno::NOENT)?.clone();
        host::setxattr(&path, name, value).await
    }

    pub async fn listxattr(
        &mut self,
        vnode: Vnode,
        _ctx: &RequestContext,
    ) -> OpResult<Vec<OsString>> {
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Ok(Vec::new());
        }
        let path = record.path().ok_or(Errno::NOENT)?.clone();
        host::listxattr(&path).await
    }

    pub async fn removexattr(
        &mut self,
        vnode: Vnode,
        name: &OsStr,
        _ctx: &RequestContext,
    ) -> OpResult<()> {
        let record = self.vm.get(vnode).await?;
        if record.is_pseudo() {
            return Err(Errno::ACCES);
        }
        let path = record.path().ok_or(Errno::NOENT)?.clone();
        host::removexattr(&path, name).await
    }
}
