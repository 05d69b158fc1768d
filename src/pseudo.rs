//! Synthetic control nodes exposed inside the overlay.
//!
//! A small tree rooted at `<source>/fuseboxctlv1` lets an external
//! driver reconfigure the auditor at runtime by reading and writing
//! ordinary-looking files, plus one null sink that swallows discarded
//! creates.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::auditor::{Auditor, Order};
use crate::fuse::{blocks_for, EntryAttributes, Errno, OpResult, Vnode};
use crate::vnode::{normalize_path, VnodeManager};

/// Name of the control directory injected at the overlay source root.
pub const CONTROLLER_FILENAME: &str = "fuseboxctlv1";

/// Content of the `version` control file.
pub const VERSION_CONTENT: &str = "Fusebox version v0.4\n";

const FILEMODE_DIR: u32 = libc::S_IFDIR | 0o777;
const FILEMODE_REG: u32 = libc::S_IFREG | 0o777;

/// The synthetic node kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PseudoNode {
    /// The control directory itself.
    ControlDir,
    /// ACL rule file: reads render the auditor state, writes are parsed
    /// as commands that mutate it.
    Acl,
    /// One-byte master switch for the auditor.
    AclSwitch,
    /// Static version string, read-only.
    Version,
    /// Sink for discarded writes and faked creates.
    Null,
}

impl PseudoNode {
    /// File-type bits plus permissions reported for this node.
    pub fn filemode(self) -> u32 {
        match self {
            PseudoNode::ControlDir => FILEMODE_DIR,
            _ => FILEMODE_REG,
        }
    }
}

/// Vnodes of the installed control tree.
pub struct Controllers {
    pub dir: Vnode,
    pub acl: Vnode,
    pub acl_switch: Vnode,
    pub version: Vnode,
    pub null: Vnode,
}

/// Absolute path of the control directory for a given overlay source.
pub fn control_path(source: &Path) -> PathBuf {
    source.join(CONTROLLER_FILENAME)
}

/// Static listing of the control directory.
pub fn control_listing() -> [&'static str; 3] {
    ["acl", "acl_switch", "version"]
}

/// Install the control tree into the manager. The null sink starts with
/// no path; discarded creates bind paths to it later.
pub fn construct_controllers(vm: &mut VnodeManager, source: &Path) -> Controllers {
    let base = control_path(source);

    let dir = vm.create_pseudo(PseudoNode::ControlDir);
    vm.add_path(dir, &base, false);

    let acl = vm.create_pseudo(PseudoNode::Acl);
    vm.add_path(acl, &base.join("acl"), false);

    let acl_switch = vm.create_pseudo(PseudoNode::AclSwitch);
    vm.add_path(acl_switch, &base.join("acl_switch"), false);

    let version = vm.create_pseudo(PseudoNode::Version);
    vm.add_path(version, &base.join("version"), false);

    let null = vm.create_pseudo(PseudoNode::Null);

    Controllers { dir, acl, acl_switch, version, null }
}

/// Render the auditor state in the `acl` wire format.
pub fn render_acl(auditor: &Auditor) -> String {
    let mut out = String::new();
    out.push_str("# Don't remove a next line\n");
    out.push_str("clearall\n\n");
    for perm in &auditor.permission_read {
        let verb = match perm.order {
            Order::Allow => "allowread",
            Order::Deny => "denyread",
            Order::Discard => continue,
        };
        out.push_str(verb);
        out.push(' ');
        out.push_str(&perm.path);
        out.push('\n');
    }
    for perm in &auditor.permission_write {
        let verb = match perm.order {
            Order::Allow => "allowwrite",
            Order::Deny => "denywrite",
            Order::Discard => "discardwrite",
        };
        out.push_str(verb);
        out.push(' ');
        out.push_str(&perm.path);
        out.push('\n');
    }
    out
}

/// Current byte content of a pseudo file.
fn contents(node: PseudoNode, auditor: &Auditor) -> String {
    match node {
        PseudoNode::ControlDir => String::new(),
        PseudoNode::Acl => render_acl(auditor),
        PseudoNode::AclSwitch => if auditor.enabled { "1" } else { "0" }.to_owned(),
        PseudoNode::Version => VERSION_CONTENT.to_owned(),
        PseudoNode::Null => String::new(),
    }
}

/// Synthesize attributes for a pseudo node.
pub fn getattr(node: PseudoNode, auditor: &Auditor, vnode: Vnode) -> EntryAttributes {
    let mut entry = EntryAttributes::new(vnode);
    entry.st_mode = node.filemode();
    match node {
        PseudoNode::ControlDir => {
            entry.st_nlink = 2;
        }
        PseudoNode::Acl => {
            entry.st_size = contents(node, auditor).len() as u64;
            entry.st_blocks = blocks_for(entry.st_size);
        }
        PseudoNode::AclSwitch | PseudoNode::Version => {
            entry.st_size = contents(node, auditor).len() as u64;
        }
        PseudoNode::Null => {}
    }
    entry
}

/// Serve a read on a pseudo file: a slice of the rendered content.
pub fn read(node: PseudoNode, auditor: &Auditor, offset: u64, length: usize) -> Vec<u8> {
    let content = contents(node, auditor);
    let bytes = content.as_bytes();
    let start = (offset as usize).min(bytes.len());
    let end = start.saturating_add(length).min(bytes.len());
    bytes[start..end].to_vec()
}

/// Serve a write on a pseudo file.
///
/// `trunc` reports whether the writing descriptor was opened with
/// `O_TRUNC`; the `acl` node uses it to decide between replacing and
/// splicing into the rendered state.
pub fn write(
    node: PseudoNode,
    auditor: &mut Auditor,
    trunc: bool,
    offset: u64,
    buf: &[u8],
) -> OpResult<usize> {
    match node {
        PseudoNode::Acl => Ok(acl_write(auditor, trunc, offset, buf)),
        PseudoNode::AclSwitch => acl_switch_write(auditor, buf),
        PseudoNode::Version | PseudoNode::ControlDir => Err(Errno::ACCES),
        PseudoNode::Null => Ok(buf.len()),
    }
}

fn acl_write(auditor: &mut Auditor, trunc: bool, offset: u64, buf: &[u8]) -> usize {
    let mut content = if trunc {
        auditor.clear_all();
        Vec::new()
    } else {
        render_acl(auditor).into_bytes()
    };
    let offset = offset as usize;
    if content.len() < offset {
        content.resize(offset, 0);
    }
    let end = offset + buf.len();
    if content.len() < end {
        content.resize(end, 0);
    }
    content[offset..end].copy_from_slice(buf);

    apply_commands(auditor, &String::from_utf8_lossy(&content));
    buf.len()
}

fn acl_switch_write(auditor: &mut Auditor, buf: &[u8]) -> OpResult<usize> {
    match buf.first() {
        Some(b'0') => {
            auditor.enabled = false;
            info!(target: "fusebox::access", "ACL disengaged");
        }
        Some(b'1') => {
            auditor.enabled = true;
            info!(target: "fusebox::access", "ACL engaged");
        }
        _ => return Err(Errno::INVAL),
    }
    Ok(buf.len())
}

/// Apply a block of ACL command lines to the auditor.
///
/// Blank lines and `#` comments are skipped; unknown verbs are logged
/// and ignored without failing the caller.
pub fn apply_commands(auditor: &mut Auditor, text: &str) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (verb, args) = match line.split_once(char::is_whitespace) {
            Some((verb, args)) => (verb, args.trim_start()),
            None => (line, ""),
        };
        debug!(target: "fusebox::operation", "acl command verb <{verb}> args <{args}>");
        let path = normalize_path(Path::new(args)).to_string_lossy().into_owned();
        if !args.is_empty() && std::fs::symlink_metadata(&path).is_err() {
            warn!(target: "fusebox::operation", "given path <{path}> does not exist");
        }
        match verb.to_ascii_lowercase().as_str() {
            "clearall" => {
                auditor.clear_all();
                info!(target: "fusebox::operation", "rules were completely cleared");
            }
            "allowread" | "addread" => {
                auditor.allow_read(path.clone());
                info!(target: "fusebox::operation", "permitted reading from path <{path}>");
            }
            "allowwrite" => {
                auditor.allow_write(path.clone());
                info!(target: "fusebox::operation", "permitted writing to path <{path}>");
            }
            "denyread" => {
                auditor.deny_read(path.clone());
                info!(target: "fusebox::operation", "prohibited reading from path <{path}>");
            }
            "denywrite" => {
                auditor.deny_write(path.clone());
                info!(target: "fusebox::operation", "prohibited writing to path <{path}>");
            }
            "discardwrite" => {
                auditor.discard_write(path.clone());
                info!(target: "fusebox::operation", "throwing away inputs to path <{path}>");
            }
            "addwrite" => {
                auditor.allow_read(path.clone());
                auditor.allow_write(path.clone());
                info!(target: "fusebox::operation", "permitted reading/writing to path <{path}>");
            }
            "adddeny" => {
                auditor.deny_read(path.clone());
                auditor.deny_write(path.clone());
                info!(target: "fusebox::operation", "prohibited reading/writing to path <{path}>");
            }
            "addpredict" => {
                auditor.allow_read(path.clone());
                auditor.discard_write(path.clone());
                info!(target: "fusebox::operation", "predicting writes to path <{path}>");
            }
            _ => {
                warn!(target: "fusebox::operation", "unknown order <{verb}> with args <{path}>, ignored");
            }
        }
    }
}
