//! Ordered access-control list evaluation for overlay paths.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Effect of a matching permission rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Order {
    /// Permit the access.
    Allow,
    /// Refuse the access.
    Deny,
    /// Pretend the mutation succeeded without touching the host.
    /// Only meaningful on the write list.
    Discard,
}

/// Fallback polarity when no rule matches a query.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecurityModel {
    /// Unmatched paths are refused.
    Whitelist,
    /// Unmatched paths are permitted.
    Blacklist,
}

/// A single ACL entry: an order applied to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub order: Order,
    pub path: String,
}

impl Permission {
    fn matches(&self, path: &Path) -> bool {
        path.as_os_str().as_bytes().starts_with(self.path.as_bytes())
    }
}

/// Holds the read and write rule lists and answers access queries.
///
/// Later rules override earlier ones: evaluation scans the relevant
/// list in reverse and the first prefix match wins. This composes into
/// a hierarchical override model, e.g. allow `/a`, deny `/a/b`, allow
/// `/a/b/c`.
#[derive(Debug, Clone)]
pub struct Auditor {
    pub permission_read: Vec<Permission>,
    pub permission_write: Vec<Permission>,
    pub security_model: SecurityModel,
    /// Master switch. When off, every query permits and nothing is
    /// discarded.
    pub enabled: bool,
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

impl Auditor {
    pub fn new() -> Self {
        Self {
            permission_read: Vec::new(),
            permission_write: Vec::new(),
            security_model: SecurityModel::Whitelist,
            enabled: true,
        }
    }

    /// Append an allow rule to the read list.
    pub fn allow_read(&mut self, path: impl Into<String>) {
        self.permission_read.push(Permission { order: Order::Allow, path: path.into() });
    }

    /// Append an allow rule to the write list.
    pub fn allow_write(&mut self, path: impl Into<String>) {
        self.permission_write.push(Permission { order: Order::Allow, path: path.into() });
    }

    /// Append a deny rule to the read list.
    pub fn deny_read(&mut self, path: impl Into<String>) {
        self.permission_read.push(Permission { order: Order::Deny, path: path.into() });
    }

    /// Append a deny rule to the write list.
    pub fn deny_write(&mut self, path: impl Into<String>) {
        self.permission_write.push(Permission { order: Order::Deny, path: path.into() });
    }

    /// Append a discard rule to the write list.
    pub fn discard_write(&mut self, path: impl Into<String>) {
        self.permission_write.push(Permission { order: Order::Discard, path: path.into() });
    }

    /// Drop every rule from both lists.
    pub fn clear_all(&mut self) {
        self.permission_read.clear();
        self.permission_write.clear();
    }

    fn check(&self, list: &[Permission], path: &Path) -> bool {
        if !self.enabled {
            return true;
        }
        for perm in list.iter().rev() {
            if perm.matches(path) {
                return perm.order != Order::Deny;
            }
        }
        match self.security_model {
            SecurityModel::Whitelist => false,
            SecurityModel::Blacklist => true,
        }
    }

    /// May `path` be read?
    pub fn ask_readable(&self, path: &Path) -> bool {
        self.check(&self.permission_read, path)
    }

    /// May `path` be written?
    pub fn ask_writable(&self, path: &Path) -> bool {
        self.check(&self.permission_write, path)
    }

    /// Should a mutation of `path` be faked instead of hitting the host?
    pub fn ask_discard(&self, path: &Path) -> bool {
        if !self.enabled {
            return false;
        }
        for perm in self.permission_write.iter().rev() {
            if perm.matches(path) {
                return perm.order == Order::Discard;
            }
        }
        false
    }
}
