//! Serves writes through open descriptors.

use std::io::SeekFrom;

use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::fuse::{Errno, Fd, OpResult};
use crate::pseudo;

use super::Fusebox;

impl Fusebox {
    /// Write `buf` at `offset`. Pseudo descriptors interpret the bytes
    /// themselves (a write to the `acl` node re-enters the auditor);
    /// descriptors tagged discard at open time echo the length without
    /// any host call.
    pub async fn write(&mut self, fd: Fd, offset: u64, buf: &[u8]) -> OpResult<usize> {
        let record = self.vm.get_by_fd(fd).await?;
        let pseudo_node = record.pseudo_node();
        let trunc = record.fd_params(fd).map(|p| p.flags & libc::O_TRUNC != 0).unwrap_or(false);
        if let Some(path) = record.path() {
            info!(target: "fusebox::access", "WRITE: {}", path.display());
        }

        if let Some(node) = pseudo_node {
            return pseudo::write(node, &mut self.auditor, trunc, offset, buf);
        }

        let params = self.vm.fd_params_mut(fd).ok_or(Errno::NOENT)?;
        if params.discard {
            debug!(target: "fusebox::operation", "write to <{}> discarded", params.path.display());
            return Ok(buf.len());
        }
        params.file.seek(SeekFrom::Start(offset)).await?;
        params.file.write_all(buf).await?;
        Ok(buf.len())
    }
}
