//! Applies attribute updates by path or through an open descriptor.

use std::os::unix::io::RawFd;
use std::path::PathBuf;

use crate::fuse::{EntryAttributes, Errno, Fd, OpResult, RequestContext, SetAttrFields, Vnode};

use super::{host, Fusebox};

enum Target {
    Path(PathBuf),
    Fd(RawFd),
}

impl Fusebox {
    /// Update the fields the kernel flagged. When the kernel supplied an
    /// open handle the fd-based syscall family is used, otherwise the
    /// path-based one; a single-timestamp update fetches the missing
    /// partner value from the host first, since the host call always
    /// sets both.
    pub async fn setattr(
        &mut self,
        vnode: Vnode,
        attr: &EntryAttributes,
        fields: &SetAttrFields,
        fd: Option<Fd>,
        _ctx: &RequestContext,
    ) -> OpResult<EntryAttributes> {
        let (vnode, target) = match fd {
            Some(fd) => {
                let record = self.vm.get_by_fd(fd).await?;
                (record.vnode(), Target::Fd(fd.0))
            }
            None => {
                let record = self.vm.get(vnode).await?;
                let path = record.path().ok_or(Errno::NOENT)?.clone();
                (record.vnode(), Target::Path(path))
            }
        };

        if fields.update_size {
            match &target {
                Target::Path(path) => host::truncate(path, attr.st_size).await?,
                Target::Fd(fd) => host::ftruncate(*fd, attr.st_size).await?,
            }
        }
        if fields.update_mode {
            let mode = attr.st_mode & 0o7777;
            match &target {
                Target::Path(path) => host::chmod(path, mode).await?,
                Target::Fd(fd) => host::fchmod(*fd, mode).await?,
            }
        }
        if fields.update_uid {
            match &target {
                Target::Path(path) => host::chown(path, attr.st_uid as i64, -1, false).await?,
                Target::Fd(fd) => host::fchown(*fd, attr.st_uid as i64, -1).await?,
            }
        }
        if fields.update_gid {
            match &target {
                Target::Path(path) => host::chown(path, -1, attr.st_gid as i64, false).await?,
                Target::Fd(fd) => host::fchown(*fd, -1, attr.st_gid as i64).await?,
            }
        }
        if fields.update_atime || fields.update_mtime {
            let (mut atime_ns, mut mtime_ns) = (attr.st_atime_ns, attr.st_mtime_ns);
            if !fields.update_mtime {
                mtime_ns = match &target {
                    Target::Path(path) => host::lstat_times(path).await?.1,
                    Target::Fd(fd) => host::fstat_times(*fd).await?.1,
                };
            } else if !fields.update_atime {
                atime_ns = match &target {
                    Target::Path(path) => host::lstat_times(path).await?.0,
                    Target::Fd(fd) => host::fstat_times(*fd).await?.0,
                };
            }
            match &target {
                Target::Path(path) => host::utimens(path, atime_ns, mtime_ns).await?,
                Target::Fd(fd) => host::futimens(*fd, atime_ns, mtime_ns).await?,
            }
        }

        self.attrs_for(vnode).await
    }
}
