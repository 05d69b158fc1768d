//! Vnode bookkeeping: the bidirectional table between kernel-visible
//! inode numbers, host absolute paths, and open host descriptors.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsStr;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File};

use crate::fuse::{Errno, Fd, OpResult, Vnode, ROOT_VNODE};
use crate::pseudo::PseudoNode;

/// Lexically normalize an absolute path: collapse `.` and `..`, drop
/// trailing separators. Purely textual, never touches the host.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
                if out.as_os_str().is_empty() {
                    out.push(Component::RootDir.as_os_str());
                }
            }
            Component::Normal(name) => out.push(name),
            Component::Prefix(_) => {}
        }
    }
    if out.as_os_str().is_empty() {
        out.push(Component::RootDir.as_os_str());
    }
    out
}

/// Per-descriptor state captured at open time.
pub struct FdParams {
    /// Path the descriptor was opened through.
    pub path: PathBuf,
    /// Open flags as requested by the kernel.
    pub flags: i32,
    /// Writes through this descriptor are swallowed.
    pub discard: bool,
    /// Owned host file; its raw descriptor is the kernel-visible handle.
    pub file: File,
}

/// Whether a record is backed by the host or synthesizes itself.
pub enum RecordKind {
    Physical,
    Pseudo(PseudoNode),
}

/// In-memory entity bound to a vnode number.
///
/// Tracks the host paths pointing at it (hard-link fan-out), the open
/// descriptors, and the kernel lookup reference count.
pub struct VnodeRecord {
    vnode: Vnode,
    paths: BTreeSet<PathBuf>,
    fd_params: BTreeMap<Fd, FdParams>,
    refcount: u64,
    kind: RecordKind,
}

impl VnodeRecord {
    pub fn vnode(&self) -> Vnode {
        self.vnode
    }

    pub fn refcount(&self) -> u64 {
        self.refcount
    }

    /// Every host path currently bound to this record.
    pub fn paths(&self) -> &BTreeSet<PathBuf> {
        &self.paths
    }

    /// A representative bound path, if any remains.
    pub fn path(&self) -> Option<&PathBuf> {
        self.paths.iter().next()
    }

    pub fn open_count(&self) -> usize {
        self.fd_params.len()
    }

    pub fn fds(&self) -> impl Iterator<Item = Fd> + '_ {
        self.fd_params.keys().copied()
    }

    pub fn fd_params(&self, fd: Fd) -> Option<&FdParams> {
        self.fd_params.get(&fd)
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub fn is_pseudo(&self) -> bool {
        matches!(self.kind, RecordKind::Pseudo(_))
    }

    pub fn pseudo_node(&self) -> Option<PseudoNode> {
        match self.kind {
            RecordKind::Pseudo(node) => Some(node),
            RecordKind::Physical => None,
        }
    }
}

/// Owns every [`VnodeRecord`] and keeps three indexes over them in
/// lock-step: by vnode number, by absolute path, by open descriptor.
///
/// All record mutation goes through manager methods so the indexes can
/// never drift from the records' own sets.
pub struct VnodeManager {
    records: HashMap<Vnode, VnodeRecord>,
    by_path: HashMap<PathBuf, Vnode>,
    by_fd: HashMap<Fd, Vnode>,
    payout_max: u64,
}

impl VnodeManager {
    /// Build a manager rooted at `root_path` and install the root record.
    pub fn new(root_path: &Path) -> io::Result<Self> {
        let root_path = normalize_path(root_path);
        if !std::fs::metadata(&root_path)?.is_dir() {
            return Err(io::Error::new(io::ErrorKind::NotADirectory, "overlay source must be a directory"));
        }
        let mut manager = Self {
            records: HashMap::new(),
            by_path: HashMap::new(),
            by_fd: HashMap::new(),
            payout_max: ROOT_VNODE.0,
        };
        manager.records.insert(
            ROOT_VNODE,
            VnodeRecord {
                vnode: ROOT_VNODE,
                paths: BTreeSet::new(),
                fd_params: BTreeMap::new(),
                refcount: 0,
                kind: RecordKind::Physical,
            },
        );
        manager.add_path(ROOT_VNODE, &root_path, true);
        Ok(manager)
    }

    /// Join `base` and `name` into a normalized absolute path.
    pub fn make_path(base: &Path, name: &OsStr) -> PathBuf {
        normalize_path(&base.join(name))
    }

    fn payout_vnode_num(&mut self) -> Vnode {
        self.payout_max += 1;
        Vnode(self.payout_max)
    }

    /// Mint a record backed by the host filesystem.
    pub fn create_physical(&mut self) -> Vnode {
        self.create_record(RecordKind::Physical)
    }

    /// Mint a persistent record that synthesizes its own attributes and I/O.
    pub fn create_pseudo(&mut self, node: PseudoNode) -> Vnode {
        self.create_record(RecordKind::Pseudo(node))
    }

    fn create_record(&mut self, kind: RecordKind) -> Vnode {
        let vnode = self.payout_vnode_num();
        self.records.insert(
            vnode,
            VnodeRecord {
                vnode,
                paths: BTreeSet::new(),
                fd_params: BTreeMap::new(),
                refcount: 0,
                kind,
            },
        );
        vnode
    }

    pub fn contains_vnode(&self, vnode: Vnode) -> bool {
        self.records.contains_key(&vnode)
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(&normalize_path(path))
    }

    pub fn vnode_by_path(&self, path: &Path) -> Option<Vnode> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    pub fn vnode_by_fd(&self, fd: Fd) -> Option<Vnode> {
        self.by_fd.get(&fd).copied()
    }

    /// Borrow a record without touching the host.
    pub fn record(&self, vnode: Vnode) -> OpResult<&VnodeRecord> {
        self.records.get(&vnode).ok_or(Errno::NOENT)
    }

    /// Resolve a vnode, pruning paths that no longer exist on the host.
    pub async fn get(&mut self, vnode: Vnode) -> OpResult<&VnodeRecord> {
        self.cleanup_record(vnode).await;
        self.records.get(&vnode).ok_or(Errno::NOENT)
    }

    /// Resolve a path, pruning stale paths of the owning record first.
    pub async fn get_by_path(&mut self, path: &Path) -> OpResult<&VnodeRecord> {
        let vnode = self.vnode_by_path(path).ok_or(Errno::NOENT)?;
        self.get(vnode).await
    }

    /// Resolve an open descriptor to its record.
    pub async fn get_by_fd(&mut self, fd: Fd) -> OpResult<&VnodeRecord> {
        let vnode = self.vnode_by_fd(fd).ok_or(Errno::NOENT)?;
        self.get(vnode).await
    }

    /// Mutable access to the open-time state of a descriptor.
    pub fn fd_params_mut(&mut self, fd: Fd) -> Option<&mut FdParams> {
        let vnode = *self.by_fd.get(&fd)?;
        self.records.get_mut(&vnode)?.fd_params.get_mut(&fd)
    }

    /// Re-check a physical record's paths against the host and evict
    /// the ones that vanished. Masks the race where renaming a parent
    /// directory invalidates every descendant path: stale descendants
    /// self-evict on their next query.
    pub async fn cleanup_record(&mut self, vnode: Vnode) {
        let stale = match self.records.get(&vnode) {
            Some(record) if !record.is_pseudo() => {
                let mut stale = Vec::new();
                for path in record.paths.iter() {
                    if fs::symlink_metadata(path).await.is_err() {
                        stale.push(path.clone());
                    }
                }
                stale
            }
            _ => return,
        };
        for path in stale {
            if let Some(record) = self.records.get_mut(&vnode) {
                record.paths.remove(&path);
            }
            if self.by_path.get(&path) == Some(&vnode) {
                self.by_path.remove(&path);
            }
        }
    }

    /// Bind `path` to the record. A collision with another record means
    /// the host object at `path` was overwritten: the path is stripped
    /// from the superseded record first.
    ///
    /// `inc_ref` distinguishes kernel-visible references (lookup,
    /// readdir emission) from internal rebinds (rename arrival, listdir
    /// materialization).
    pub fn add_path(&mut self, vnode: Vnode, path: &Path, inc_ref: bool) {
        let path = normalize_path(path);
        if let Some(&previous) = self.by_path.get(&path) {
            if previous != vnode {
                self.remove_path(previous, &path);
            }
        }
        let Some(record) = self.records.get_mut(&vnode) else { return };
        record.paths.insert(path.clone());
        if inc_ref {
            record.refcount += 1;
        }
        self.by_path.insert(path, vnode);
    }

    /// Unbind `path` from the record. When its last path goes away and
    /// no descriptor is open, the record is dropped from every index.
    pub fn remove_path(&mut self, vnode: Vnode, path: &Path) {
        let path = normalize_path(path);
        let Some(record) = self.records.get_mut(&vnode) else { return };
        record.paths.remove(&path);
        let orphaned = record.paths.is_empty() && record.fd_params.is_empty();
        if self.by_path.get(&path) == Some(&vnode) {
            self.by_path.remove(&path);
        }
        if orphaned {
            self.unbind(vnode);
        }
    }

    /// Register an opened descriptor with the record that owns it.
    pub fn open_fd(&mut self, vnode: Vnode, params: FdParams) -> Fd {
        let fd = Fd(params.file.as_raw_fd());
        if let Some(record) = self.records.get_mut(&vnode) {
            record.fd_params.insert(fd, params);
            self.by_fd.insert(fd, vnode);
        }
        fd
    }

    /// Unregister a descriptor, returning its open-time state so the
    /// caller can close the host file. Drops the record once nothing
    /// references it.
    pub fn close_fd(&mut self, fd: Fd) -> Option<FdParams> {
        let vnode = self.by_fd.remove(&fd)?;
        let record = self.records.get_mut(&vnode)?;
        let params = record.fd_params.remove(&fd);
        if record.paths.is_empty() && record.fd_params.is_empty() && record.refcount == 0 {
            self.unbind(vnode);
        }
        params
    }

    /// Drop a record that was minted speculatively (e.g. during a
    /// directory listing) but that the kernel never referenced.
    pub fn drop_unreferenced(&mut self, vnode: Vnode) {
        if let Some(record) = self.records.get(&vnode) {
            if record.refcount == 0 && record.fd_params.is_empty() {
                self.unbind(vnode);
            }
        }
    }

    /// Drop `nlookup` kernel references; at zero with no open
    /// descriptors the record is dropped from every index.
    pub fn forget_reference(&mut self, vnode: Vnode, nlookup: u64) {
        let Some(record) = self.records.get_mut(&vnode) else { return };
        record.refcount = record.refcount.saturating_sub(nlookup);
        if record.refcount == 0 && record.fd_params.is_empty() {
            self.unbind(vnode);
        }
    }

    /// Remove the record and all its index entries. Pseudo records and
    /// the root are persistent and survive every unbind request.
    fn unbind(&mut self, vnode: Vnode) {
        if vnode == ROOT_VNODE {
            return;
        }
        match self.records.get(&vnode) {
            Some(record) if !record.is_pseudo() => {}
            _ => return,
        }
        if let Some(record) = self.records.remove(&vnode) {
            for path in record.paths.iter() {
                if self.by_path.get(path) == Some(&vnode) {
                    self.by_path.remove(path);
                }
            }
            for fd in record.fd_params.keys() {
                if self.by_fd.get(fd) == Some(&vnode) {
                    self.by_fd.remove(fd);
                }
            }
        }
    }
}
