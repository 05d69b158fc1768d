//! Fusebox - a user-space overlay filesystem that interposes on every
//! file operation of a sandboxed command.
//!
//! The overlay mirrors a host directory tree, mediates each operation
//! against a programmable access-control policy, and exposes an
//! in-filesystem control interface (`<source>/fuseboxctlv1`) through
//! which an external driver reconfigures that policy at runtime.

pub mod access_log;
pub mod auditor;
pub mod config;
pub mod fuse;
pub mod fusefs;
pub mod pseudo;
pub mod session;
pub mod vnode;

pub use fusefs::Fusebox;
