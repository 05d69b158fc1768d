//! Overlay filesystem operation dispatcher.
//!
//! One handler per kernel operation. Each handler resolves its inode
//! arguments through the vnode manager, consults the auditor, performs
//! the host call (or diverts to the pseudo subtree / null sink), and
//! updates vnode state before replying.

mod create;
mod forget;
mod get_attr;
mod host;
mod link;
mod lookup;
mod mk_dir;
mod mk_node;
mod open;
mod open_dir;
mod read;
mod read_dir;
mod read_link;
mod release;
mod rename;
mod rm_dir;
mod set_attr;
mod stat_fs;
mod symlink;
mod unlink;
mod write;
mod xattr;

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

use crate::auditor::Auditor;
use crate::fuse::{EntryAttributes, Errno, OpResult, Vnode};
use crate::pseudo::{self, Controllers, PseudoNode};
use crate::vnode::{normalize_path, VnodeManager};

/// The overlay filesystem instance: vnode table, policy, pseudo tree,
/// and the recorded open-path sets.
pub struct Fusebox {
    pub vm: VnodeManager,
    pub auditor: Auditor,
    path_source: PathBuf,
    path_mountpoint: PathBuf,
    controllers: Controllers,
    /// Paths opened read-only.
    pub stat_path_open_r: BTreeSet<PathBuf>,
    /// Paths opened write-only.
    pub stat_path_open_w: BTreeSet<PathBuf>,
    /// Paths opened read-write.
    pub stat_path_open_rw: BTreeSet<PathBuf>,
}

impl Fusebox {
    /// Build an overlay over `path_source`, to be attached at
    /// `path_mountpoint`. Verifies the source and installs the root
    /// record and the control tree.
    pub fn new(path_source: &Path, path_mountpoint: &Path) -> io::Result<Self> {
        let path_source = normalize_path(path_source);
        let path_mountpoint = normalize_path(path_mountpoint);
        let mut vm = VnodeManager::new(&path_source)?;
        let controllers = pseudo::construct_controllers(&mut vm, &path_source);
        Ok(Self {
            vm,
            auditor: Auditor::new(),
            path_source,
            path_mountpoint,
            controllers,
            stat_path_open_r: BTreeSet::new(),
            stat_path_open_w: BTreeSet::new(),
            stat_path_open_rw: BTreeSet::new(),
        })
    }

    /// The overlay source root.
    pub fn source(&self) -> &Path {
        &self.path_source
    }

    /// The host directory the overlay is attached at.
    pub fn mountpoint(&self) -> &Path {
        &self.path_mountpoint
    }

    /// Vnodes of the installed control tree.
    pub fn controllers(&self) -> &Controllers {
        &self.controllers
    }

    /// Attribute reply for any resolvable vnode. The mountpoint never
    /// reports attributes through the overlay.
    pub(crate) async fn attrs_for(&mut self, vnode: Vnode) -> OpResult<EntryAttributes> {
        let record = self.vm.get(vnode).await?;
        if record.paths().contains(&self.path_mountpoint) {
            return Err(Errno::NOENT);
        }
        match record.pseudo_node() {
            Some(node) => Ok(pseudo::getattr(node, &self.auditor, vnode)),
            None => {
                let path = record.path().ok_or(Errno::NOENT)?.clone();
                let meta = tokio::fs::symlink_metadata(&path).await?;
                Ok(EntryAttributes::from_metadata(&meta, vnode))
            }
        }
    }

    /// Compose `parent/name`, refusing to expose the mountpoint as a
    /// child of any alias of the parent.
    pub(crate) async fn resolve_child(&mut self, parent: Vnode, name: &OsStr) -> OpResult<PathBuf> {
        let record = self.vm.get(parent).await?;
        for base in record.paths() {
            if VnodeManager::make_path(base, name) == self.path_mountpoint {
                return Err(Errno::NOENT);
            }
        }
        let base = record.path().ok_or(Errno::NOENT)?;
        Ok(VnodeManager::make_path(base, name))
    }

    /// Synthetic attributes served for discarded creates.
    pub(crate) fn null_attrs(&self) -> EntryAttributes {
        pseudo::getattr(PseudoNode::Null, &self.auditor, self.controllers.null)
    }

    /// Does `path` currently resolve to a pseudo record?
    pub(crate) fn is_pseudo_path(&self, path: &Path) -> bool {
        self.vm
            .vnode_by_path(path)
            .and_then(|vnode| self.vm.record(vnode).ok())
            .map(|record| record.is_pseudo())
            .unwrap_or(false)
    }
}

/// Open a host file honoring the kernel's raw open flags. Everything
/// except the access mode is forwarded to `open(2)` untouched.
pub(crate) async fn open_with_flags(path: &Path, flags: i32, mode: Option<u32>) -> OpResult<File> {
    let mut options = OpenOptions::new();
    match flags & libc::O_ACCMODE {
        libc::O_WRONLY => {
            options.write(true);
        }
        libc::O_RDWR => {
            options.read(true).write(true);
        }
        _ => {
            options.read(true);
        }
    }
    options.custom_flags(flags & !libc::O_ACCMODE);
    if let Some(mode) = mode {
        options.mode(mode);
    }
    Ok(options.open(path).await?)
}
