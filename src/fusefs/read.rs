//! Serves reads through open descriptors.

use std::io::SeekFrom;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::info;

use crate::fuse::{Errno, Fd, OpResult};
use crate::pseudo;

use super::Fusebox;

impl Fusebox {
    /// Read up to `length` bytes at `offset`. Pseudo descriptors render
    /// their own content; host descriptors seek-and-read, so interleaved
    /// reads and writes on one descriptor never race on the host file
    /// position.
    pub async fn read(&mut self, fd: Fd, offset: u64, length: usize) -> OpResult<Vec<u8>> {
        let record = self.vm.get_by_fd(fd).await?;
        let pseudo_node = record.pseudo_node();
        if let Some(path) = record.path() {
            info!(target: "fusebox::access", "READ: {}", path.display());
        }

        if let Some(node) = pseudo_node {
            return Ok(pseudo::read(node, &self.auditor, offset, length));
        }

        let params = self.vm.fd_params_mut(fd).ok_or(Errno::NOENT)?;
        params.file.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0u8; length];
        let mut filled = 0;
        while filled < length {
            let count = params.file.read(&mut data[filled..]).await?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        data.truncate(filled);
        Ok(data)
    }
}
