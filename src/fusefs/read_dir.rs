//! Lists directories, injecting the control tree and hiding the
//! mountpoint.

use std::ffi::{OsStr, OsString};

use tracing::debug;

use crate::fuse::{Errno, OpResult, ReaddirReply, Vnode};
use crate::pseudo::{self, PseudoNode};
use crate::vnode::VnodeManager;

use super::Fusebox;

impl Fusebox {
    /// Emit the entries of `vnode` whose inode number exceeds `offset`,
    /// sorted by inode number so the offset doubles as a resume cookie.
    ///
    /// Children are materialized on sight without a kernel reference;
    /// the reference is taken only for entries the kernel actually
    /// accepted. When the reply buffer fills up, a record minted for the
    /// rejected entry is dropped again.
    pub async fn readdir(
        &mut self,
        vnode: Vnode,
        offset: u64,
        reply: &mut (dyn ReaddirReply + Send),
    ) -> OpResult<()> {
        let record = self.vm.get(vnode).await?;
        let pseudo_dir = match record.pseudo_node() {
            Some(PseudoNode::ControlDir) => true,
            Some(_) => return Err(Errno(libc::ENOTDIR)),
            None => false,
        };
        let parent_paths = record.paths().clone();
        let parent_path = record.path().ok_or(Errno::NOENT)?.clone();
        debug!(target: "fusebox::operation", "readdir called: {}", parent_path.display());

        let mut children: Vec<(Vnode, OsString)> = Vec::new();
        if pseudo_dir {
            for name in pseudo::control_listing() {
                let child_path = VnodeManager::make_path(&parent_path, OsStr::new(name));
                if let Some(child) = self.vm.vnode_by_path(&child_path) {
                    children.push((child, OsString::from(name)));
                }
            }
        } else {
            if parent_paths.contains(&self.path_source) {
                let ctl_path = pseudo::control_path(&self.path_source);
                let ctl = self.controllers.dir;
                self.vm.add_path(ctl, &ctl_path, false);
                children.push((ctl, OsString::from(pseudo::CONTROLLER_FILENAME)));
            }
            let mut dir = tokio::fs::read_dir(&parent_path).await?;
            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name();
                if name == OsStr::new(".")
                    || name == OsStr::new("..")
                    || name == OsStr::new(pseudo::CONTROLLER_FILENAME)
                {
                    continue;
                }
                if parent_paths
                    .iter()
                    .any(|base| VnodeManager::make_path(base, &name) == self.path_mountpoint)
                {
                    continue;
                }
                let child_path = VnodeManager::make_path(&parent_path, &name);
                // host listings can briefly name entries that are already gone
                if tokio::fs::symlink_metadata(&child_path).await.is_err() {
                    continue;
                }
                let child = match self.vm.vnode_by_path(&child_path) {
                    Some(child) => child,
                    None => self.vm.create_physical(),
                };
                self.vm.add_path(child, &child_path, false);
                children.push((child, name));
            }
        }

        let mut entries = Vec::with_capacity(children.len());
        for (child, name) in children {
            let attr = self.attrs_for(child).await?;
            entries.push((child, name, attr));
        }
        entries.sort_by_key(|&(child, _, _)| child);
        debug!(target: "fusebox::operation", "read {} entries, starting at {offset}", entries.len());

        for (child, name, attr) in entries {
            if child.0 <= offset {
                continue;
            }
            if !reply.push(&name, &attr, child) {
                self.vm.drop_unreferenced(child);
                break;
            }
            let child_path = VnodeManager::make_path(&parent_path, &name);
            self.vm.add_path(child, &child_path, true);
        }
        Ok(())
    }
}
