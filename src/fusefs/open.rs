//! Opens overlay objects, applying the access gates.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::fuse::{Errno, FileInfo, OpResult, RequestContext, Vnode};
use crate::vnode::FdParams;

use super::{open_with_flags, Fusebox};

impl Fusebox {
    /// Open a vnode.
    ///
    /// Pseudo records reserve a descriptor number by opening `/dev/null`
    /// and serve all I/O themselves. Discard-target paths are re-opened
    /// read-only behind the caller's back and their descriptors tagged so
    /// later writes are swallowed. Everything else passes the auditor
    /// gates matching the requested access mode and is recorded in the
    /// open-path stat sets.
    pub async fn open(
        &mut self,
        vnode: Vnode,
        flags: i32,
        _ctx: &RequestContext,
    ) -> OpResult<FileInfo> {
        let record = self.vm.get(vnode).await?;
        let pseudo = record.is_pseudo();
        let path = record.path().cloned();

        if pseudo {
            let path = path.unwrap_or_else(|| PathBuf::from("/dev/null"));
            info!(target: "fusebox::access", "OPEN: {}", path.display());
            let file = open_with_flags(Path::new("/dev/null"), flags, None).await?;
            let fd = self.vm.open_fd(vnode, FdParams { path, flags, discard: false, file });
            return Ok(FileInfo { fh: fd });
        }

        let path = path.ok_or(Errno::NOENT)?;
        info!(target: "fusebox::access", "OPEN: {}", path.display());

        if self.auditor.ask_discard(&path) {
            let masked = (flags & !(libc::O_ACCMODE | libc::O_TRUNC)) | libc::O_RDONLY;
            let file = open_with_flags(&path, masked, None).await?;
            let fd = self.vm.open_fd(vnode, FdParams { path, flags, discard: true, file });
            return Ok(FileInfo { fh: fd });
        }

        let accmode = flags & libc::O_ACCMODE;
        let permitted = match accmode {
            libc::O_RDWR => {
                self.auditor.ask_readable(&path) && self.auditor.ask_writable(&path)
            }
            libc::O_WRONLY => self.auditor.ask_writable(&path),
            _ => self.auditor.ask_readable(&path),
        };
        if !permitted {
            info!(target: "fusebox::operation", "access to path <{}> is not permitted", path.display());
            return Err(Errno::ACCES);
        }

        let file = open_with_flags(&path, flags, None).await?;
        match accmode {
            libc::O_RDWR => self.stat_path_open_rw.insert(path.clone()),
            libc::O_WRONLY => self.stat_path_open_w.insert(path.clone()),
            _ => self.stat_path_open_r.insert(path.clone()),
        };
        let fd = self.vm.open_fd(vnode, FdParams { path, flags, discard: false, file });
        Ok(FileInfo { fh: fd })
    }
}
