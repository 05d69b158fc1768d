use std::ffi::OsStr;
use std::path::PathBuf;

use fusebox::auditor::SecurityModel;
use fusebox::fuse::{EntryAttributes, OpResult, RequestContext, Vnode, ROOT_VNODE};
use fusebox::Fusebox;
use tempfile::TempDir;

/// Overlay instance over a temporary source tree, with the mountpoint
/// placed inside the source so hiding can be exercised.
pub struct Fixture {
    pub tempdir: TempDir,
    pub fs: Fusebox,
}

pub const MOUNTPOINT_NAME: &str = "mnt";

impl Fixture {
    pub fn new() -> Self {
        let tempdir = TempDir::new().expect("create temp dir");
        let source = tempdir.path().join("src");
        let mountpoint = source.join(MOUNTPOINT_NAME);
        std::fs::create_dir(&source).expect("create source dir");
        std::fs::create_dir(&mountpoint).expect("create mountpoint dir");
        let fs = Fusebox::new(&source, &mountpoint).expect("construct overlay");
        Self { tempdir, fs }
    }

    /// Fixture with the auditor in blacklist mode, so plain operations
    /// pass and tests opt into restrictions rule by rule.
    pub fn permissive() -> Self {
        let mut fixture = Self::new();
        fixture.fs.auditor.security_model = SecurityModel::Blacklist;
        fixture
    }

    pub fn source(&self) -> PathBuf {
        self.fs.source().to_path_buf()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.source().join(name)
    }

    pub fn write_file(&self, name: &str, data: &[u8]) {
        std::fs::write(self.path(name), data).expect("write fixture file");
    }

    pub fn create_dir(&self, name: &str) {
        std::fs::create_dir(self.path(name)).expect("create fixture dir");
    }

    pub async fn lookup(&mut self, parent: Vnode, name: &str) -> OpResult<EntryAttributes> {
        self.fs.lookup(parent, OsStr::new(name), &ctx()).await
    }

    /// Resolve a root-level name, taking a lookup reference.
    pub async fn node(&mut self, name: &str) -> Vnode {
        self.lookup(ROOT_VNODE, name).await.expect("lookup succeeds").st_ino
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::default()
}
