//! Closes open descriptors.

use crate::fuse::{Errno, Fd, OpResult};

use super::Fusebox;

impl Fusebox {
    /// Close the host descriptor and unregister it. Dropping the owned
    /// file closes it; a record whose last path and last descriptor are
    /// both gone drops with it.
    pub async fn release(&mut self, fd: Fd) -> OpResult<()> {
        let params = self.vm.close_fd(fd).ok_or(Errno::NOENT)?;
        drop(params);
        Ok(())
    }
}
