//! Thin async wrappers over the host syscalls `tokio::fs` does not
//! cover. Each call runs on the blocking pool and surfaces the raw OS
//! errno on failure.

use std::ffi::{CString, OsStr, OsString};
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use tokio::task;

use crate::fuse::{Errno, OpResult, StatvfsData};

fn cstring(path: &Path) -> OpResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::INVAL)
}

fn cstring_name(name: &OsStr) -> OpResult<CString> {
    CString::new(name.as_bytes()).map_err(|_| Errno::INVAL)
}

fn check(ret: libc::c_int) -> Result<(), Errno> {
    if ret == 0 {
        Ok(())
    } else {
        Err(Errno::from(io::Error::last_os_error()))
    }
}

async fn run<T, F>(f: F) -> OpResult<T>
where
    F: FnOnce() -> Result<T, Errno> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f).await.map_err(|_| Errno::IO)?
}

/// `chown(2)` / `lchown(2)` on a path; `-1` leaves an owner unchanged.
pub async fn chown(path: &Path, uid: i64, gid: i64, follow_symlinks: bool) -> OpResult<()> {
    let path = cstring(path)?;
    run(move || {
        let ret = if follow_symlinks {
            unsafe { libc::chown(path.as_ptr(), uid as libc::uid_t, gid as libc::gid_t) }
        } else {
            unsafe { libc::lchown(path.as_ptr(), uid as libc::uid_t, gid as libc::gid_t) }
        };
        check(ret)
    })
    .await
}

/// `fchown(2)` on an open descriptor.
pub async fn fchown(fd: RawFd, uid: i64, gid: i64) -> OpResult<()> {
    run(move || check(unsafe { libc::fchown(fd, uid as libc::uid_t, gid as libc::gid_t) })).await
}

/// `truncate(2)`.
pub async fn truncate(path: &Path, size: u64) -> OpResult<()> {
    let path = cstring(path)?;
    run(move || check(unsafe { libc::truncate(path.as_ptr(), size as libc::off_t) })).await
}

/// `ftruncate(2)`.
pub async fn ftruncate(fd: RawFd, size: u64) -> OpResult<()> {
    run(move || check(unsafe { libc::ftruncate(fd, size as libc::off_t) })).await
}

/// `chmod(2)` with the permission bits only.
pub async fn chmod(path: &Path, mode: u32) -> OpResult<()> {
    let path = cstring(path)?;
    run(move || check(unsafe { libc::chmod(path.as_ptr(), mode as libc::mode_t) })).await
}

/// `fchmod(2)`.
pub async fn fchmod(fd: RawFd, mode: u32) -> OpResult<()> {
    run(move || check(unsafe { libc::fchmod(fd, mode as libc::mode_t) })).await
}

fn timespec(ns: i64) -> libc::timespec {
    libc::timespec {
        tv_sec: (ns / 1_000_000_000) as libc::time_t,
        tv_nsec: (ns % 1_000_000_000) as libc::c_long,
    }
}

/// `utimensat(2)` without following symlinks.
pub async fn utimens(path: &Path, atime_ns: i64, mtime_ns: i64) -> OpResult<()> {
    let path = cstring(path)?;
    run(move || {
        let times = [timespec(atime_ns), timespec(mtime_ns)];
        check(unsafe {
            libc::utimensat(libc::AT_FDCWD, path.as_ptr(), times.as_ptr(), libc::AT_SYMLINK_NOFOLLOW)
        })
    })
    .await
}

/// `futimens(3)` on an open descriptor.
pub async fn futimens(fd: RawFd, atime_ns: i64, mtime_ns: i64) -> OpResult<()> {
    run(move || {
        let times = [timespec(atime_ns), timespec(mtime_ns)];
        check(unsafe { libc::futimens(fd, times.as_ptr()) })
    })
    .await
}

/// Timestamps of a path, symlink-preserving.
pub async fn lstat_times(path: &Path) -> OpResult<(i64, i64)> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    use std::os::unix::fs::MetadataExt;
    Ok((
        meta.atime().wrapping_mul(1_000_000_000).wrapping_add(meta.atime_nsec()),
        meta.mtime().wrapping_mul(1_000_000_000).wrapping_add(meta.mtime_nsec()),
    ))
}

/// Timestamps of an open descriptor.
pub async fn fstat_times(fd: RawFd) -> OpResult<(i64, i64)> {
    run(move || {
        let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();
        check(unsafe { libc::fstat(fd, stat.as_mut_ptr()) })?;
        let stat = unsafe { stat.assume_init() };
        Ok((
            stat.st_atime.wrapping_mul(1_000_000_000).wrapping_add(stat.st_atime_nsec),
            stat.st_mtime.wrapping_mul(1_000_000_000).wrapping_add(stat.st_mtime_nsec),
        ))
    })
    .await
}

/// `mknod(2)`.
pub async fn mknod(path: &Path, mode: u32, rdev: u64) -> OpResult<()> {
    let path = cstring(path)?;
    run(move || {
        check(unsafe { libc::mknod(path.as_ptr(), mode as libc::mode_t, rdev as libc::dev_t) })
    })
    .await
}

/// `statvfs(3)` on the overlay source root.
pub async fn statvfs(path: &Path) -> OpResult<StatvfsData> {
    let path = cstring(path)?;
    run(move || {
        let mut stat = std::mem::MaybeUninit::<libc::statvfs>::uninit();
        check(unsafe { libc::statvfs(path.as_ptr(), stat.as_mut_ptr()) })?;
        let stat = unsafe { stat.assume_init() };
        Ok(StatvfsData {
            f_bsize: stat.f_bsize as u64,
            f_frsize: stat.f_frsize as u64,
            f_blocks: stat.f_blocks as u64,
            f_bfree: stat.f_bfree as u64,
            f_bavail: stat.f_bavail as u64,
            f_files: stat.f_files as u64,
            f_ffree: stat.f_ffree as u64,
            f_favail: stat.f_favail as u64,
            f_namemax: stat.f_namemax as u64,
        })
    })
    .await
}

/// `lgetxattr(2)`: fetch one extended attribute, retrying while the
/// value grows under us.
pub async fn getxattr(path: &Path, name: &OsStr) -> OpResult<Vec<u8>> {
    let path = cstring(path)?;
    let name = cstring_name(name)?;
    run(move || loop {
        let size = unsafe {
            libc::lgetxattr(path.as_ptr(), name.as_ptr(), std::ptr::null_mut(), 0)
        };
        if size < 0 {
            return Err(Errno::from(io::Error::last_os_error()));
        }
        let mut buf = vec![0u8; size as usize];
        let got = unsafe {
            libc::lgetxattr(path.as_ptr(), name.as_ptr(), buf.as_mut_ptr().cast(), buf.len())
        };
        if got >= 0 {
            buf.truncate(got as usize);
            return Ok(buf);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ERANGE) {
            return Err(Errno::from(err));
        }
    })
    .await
}

/// `lsetxattr(2)`.
pub async fn setxattr(path: &Path, name: &OsStr, value: &[u8]) -> OpResult<()> {
    let path = cstring(path)?;
    let name = cstring_name(name)?;
    let value = value.to_vec();
    run(move || {
        check(unsafe {
            libc::lsetxattr(path.as_ptr(), name.as_ptr(), value.as_ptr().cast(), value.len(), 0)
        })
    })
    .await
}

/// `llistxattr(2)`: every attribute name attached to the path.
pub async fn listxattr(path: &Path) -> OpResult<Vec<OsString>> {
    let path = cstring(path)?;
    run(move || loop {
        let size = unsafe { libc::llistxattr(path.as_ptr(), std::ptr::null_mut(), 0) };
        if size < 0 {
            return Err(Errno::from(io::Error::last_os_error()));
        }
        let mut buf = vec![0u8; size as usize];
        let got = unsafe { libc::llistxattr(path.as_ptr(), buf.as_mut_ptr().cast(), buf.len()) };
        if got >= 0 {
            buf.truncate(got as usize);
            return Ok(buf
                .split(|byte| *byte == 0)
                .filter(|name| !name.is_empty())
                .map(|name| OsString::from_vec(name.to_vec()))
                .collect());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ERANGE) {
            return Err(Errno::from(err));
        }
    })
    .await
}

/// `lremovexattr(2)`.
pub async fn removexattr(path: &Path, name: &OsStr) -> OpResult<()> {
    let path = cstring(path)?;
    let name = cstring_name(name)?;
    run(move || check(unsafe { libc::lremovexattr(path.as_ptr(), name.as_ptr()) })).await
}

/// `symlink(2)`.
pub async fn symlink(target: &OsStr, link_path: &Path) -> OpResult<()> {
    let target = PathBuf::from(target.to_os_string());
    let link_path = link_path.to_path_buf();
    run(move || std::os::unix::fs::symlink(&target, &link_path).map_err(Errno::from)).await
}
