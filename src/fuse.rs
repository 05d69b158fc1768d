//! Defines the kernel-facing protocol surface shared by every handler.

use std::ffi::OsStr;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::RawFd;

use num_derive::FromPrimitive;

/// Result of filesystem operations.
pub type OpResult<T> = std::result::Result<T, Errno>;

/// Vnode number of the overlay root, as fixed by the kernel protocol.
pub const ROOT_VNODE: Vnode = Vnode(1);

/// Block size reported for every attribute reply.
pub const BLOCK_SIZE: u32 = 512;

/// Kernel-visible inode identity of an overlay object.
///
/// Independent of the host inode number; minted by the vnode manager.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vnode(pub u64);

impl std::fmt::Display for Vnode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Host file descriptor handed back to the kernel as an open handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fd(pub RawFd);

impl std::fmt::Display for Fd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Raw OS error number surfaced to the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Errno(pub i32);

impl Errno {
    /// No such file or directory.
    pub const NOENT: Errno = Errno(libc::ENOENT);
    /// Permission denied.
    pub const ACCES: Errno = Errno(libc::EACCES);
    /// Invalid argument.
    pub const INVAL: Errno = Errno(libc::EINVAL);
    /// No data available (xattr queries on pseudo nodes).
    pub const NODATA: Errno = Errno(libc::ENODATA);
    /// Generic I/O error, used when the host error carries no errno.
    pub const IO: Errno = Errno(libc::EIO);
}

impl From<io::Error> for Errno {
    fn from(err: io::Error) -> Self {
        err.raw_os_error().map(Errno).unwrap_or(Errno::IO)
    }
}

impl std::fmt::Display for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

/// Enumerates the kernel request opcodes the dispatcher recognizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum Opcode {
    Lookup = 1,
    Forget = 2,
    GetAttr = 3,
    SetAttr = 4,
    ReadLink = 5,
    SymLink = 6,
    MkNod = 8,
    MkDir = 9,
    Unlink = 10,
    RmDir = 11,
    Rename = 12,
    Link = 13,
    Open = 14,
    Read = 15,
    Write = 16,
    StatFs = 17,
    Release = 18,
    SetXattr = 21,
    GetXattr = 22,
    ListXattr = 23,
    RemoveXattr = 24,
    OpenDir = 27,
    ReadDir = 28,
    Create = 35,
}

/// Identity of the process that issued a kernel request.
#[derive(Debug, Copy, Clone)]
pub struct RequestContext {
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub umask: u32,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self { uid: 0, gid: 0, pid: 0, umask: 0 }
    }
}

/// Attribute reply for `lookup`/`getattr`-class operations.
///
/// Timeouts are always zero: the overlay never lets the kernel cache
/// host attributes.
#[derive(Debug, Clone)]
pub struct EntryAttributes {
    pub st_ino: Vnode,
    pub st_mode: u32,
    pub st_nlink: u64,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_rdev: u64,
    pub st_size: u64,
    pub st_atime_ns: i64,
    pub st_mtime_ns: i64,
    pub st_ctime_ns: i64,
    pub st_blksize: u32,
    pub st_blocks: u64,
    pub generation: u64,
    pub entry_timeout: u64,
    pub attr_timeout: u64,
}

impl EntryAttributes {
    /// Blank attribute record bound to `vnode`.
    pub fn new(vnode: Vnode) -> Self {
        Self {
            st_ino: vnode,
            st_mode: 0,
            st_nlink: 1,
            st_uid: 0,
            st_gid: 0,
            st_rdev: 0,
            st_size: 0,
            st_atime_ns: 0,
            st_mtime_ns: 0,
            st_ctime_ns: 0,
            st_blksize: BLOCK_SIZE,
            st_blocks: 0,
            generation: 0,
            entry_timeout: 0,
            attr_timeout: 0,
        }
    }

    /// Copy host metadata into an attribute record for `vnode`.
    pub fn from_metadata(meta: &std::fs::Metadata, vnode: Vnode) -> Self {
        let mut entry = Self::new(vnode);
        entry.st_mode = meta.mode();
        entry.st_nlink = meta.nlink();
        entry.st_uid = meta.uid();
        entry.st_gid = meta.gid();
        entry.st_rdev = meta.rdev();
        entry.st_size = meta.size();
        entry.st_atime_ns = meta.atime().wrapping_mul(1_000_000_000).wrapping_add(meta.atime_nsec());
        entry.st_mtime_ns = meta.mtime().wrapping_mul(1_000_000_000).wrapping_add(meta.mtime_nsec());
        entry.st_ctime_ns = meta.ctime().wrapping_mul(1_000_000_000).wrapping_add(meta.ctime_nsec());
        entry.st_blocks = blocks_for(entry.st_size);
        entry
    }
}

/// Number of [`BLOCK_SIZE`] blocks needed to hold `size` bytes.
pub fn blocks_for(size: u64) -> u64 {
    (size + BLOCK_SIZE as u64 - 1) / BLOCK_SIZE as u64
}

/// Attribute fields the kernel asked `setattr` to update.
#[derive(Debug, Copy, Clone, Default)]
pub struct SetAttrFields {
    pub update_size: bool,
    pub update_mode: bool,
    pub update_uid: bool,
    pub update_gid: bool,
    pub update_atime: bool,
    pub update_mtime: bool,
}

/// Host filesystem statistics reply for `statfs`.
#[derive(Debug, Copy, Clone, Default)]
pub struct StatvfsData {
    pub f_bsize: u64,
    pub f_frsize: u64,
    pub f_blocks: u64,
    pub f_bfree: u64,
    pub f_bavail: u64,
    pub f_files: u64,
    pub f_ffree: u64,
    pub f_favail: u64,
    pub f_namemax: u64,
}

/// Open-handle reply for `open`/`create`.
#[derive(Debug, Copy, Clone)]
pub struct FileInfo {
    pub fh: Fd,
}

/// Sink the `readdir` handler emits entries into.
///
/// `push` returns `false` once the kernel reply buffer is out of room;
/// the handler must stop emitting and must not take a lookup reference
/// for the rejected entry.
pub trait ReaddirReply {
    fn push(&mut self, name: &OsStr, attr: &EntryAttributes, vnode: Vnode) -> bool;
}
