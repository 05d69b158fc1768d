//! Request/reply plumbing between the kernel transport and the
//! dispatcher.
//!
//! The transport (out of scope here) parses kernel requests into
//! [`Request`] values and feeds them through a channel; a single
//! [`SessionTask`] owns the [`Fusebox`] instance and serves requests one
//! at a time, so no two handlers ever mutate shared state concurrently.

use std::ffi::{OsStr, OsString};
use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::fuse::{
    EntryAttributes, Fd, FileInfo, OpResult, Opcode, ReaddirReply, RequestContext, SetAttrFields,
    StatvfsData, Vnode,
};
use crate::fusefs::Fusebox;

/// A parsed kernel request.
pub struct Request {
    /// Kernel-assigned request identifier, echoed in the reply.
    pub unique: u64,
    pub ctx: RequestContext,
    pub op: Operation,
}

/// Operation payloads, one per recognized opcode.
pub enum Operation {
    Lookup { parent: Vnode, name: OsString },
    Forget { pairs: Vec<(Vnode, u64)> },
    GetAttr { vnode: Vnode },
    SetAttr { vnode: Vnode, attr: EntryAttributes, fields: SetAttrFields, fd: Option<Fd> },
    ReadLink { vnode: Vnode },
    MkNod { parent: Vnode, name: OsString, mode: u32, rdev: u64 },
    MkDir { parent: Vnode, name: OsString, mode: u32 },
    Unlink { parent: Vnode, name: OsString },
    RmDir { parent: Vnode, name: OsString },
    SymLink { parent: Vnode, name: OsString, target: OsString },
    Rename { old_parent: Vnode, old_name: OsString, new_parent: Vnode, new_name: OsString, flags: u32 },
    Link { vnode: Vnode, new_parent: Vnode, new_name: OsString },
    Open { vnode: Vnode, flags: i32 },
    Read { fd: Fd, offset: u64, length: usize },
    Write { fd: Fd, offset: u64, data: Vec<u8> },
    Release { fd: Fd },
    OpenDir { vnode: Vnode },
    ReadDir { vnode: Vnode, offset: u64, max_entries: usize },
    StatFs,
    GetXattr { vnode: Vnode, name: OsString },
    SetXattr { vnode: Vnode, name: OsString, value: Vec<u8> },
    ListXattr { vnode: Vnode },
    RemoveXattr { vnode: Vnode, name: OsString },
    Create { parent: Vnode, name: OsString, mode: u32, flags: i32 },
}

impl Operation {
    /// The kernel opcode this payload answers.
    pub fn opcode(&self) -> Opcode {
        match self {
            Operation::Lookup { .. } => Opcode::Lookup,
            Operation::Forget { .. } => Opcode::Forget,
            Operation::GetAttr { .. } => Opcode::GetAttr,
            Operation::SetAttr { .. } => Opcode::SetAttr,
            Operation::ReadLink { .. } => Opcode::ReadLink,
            Operation::MkNod { .. } => Opcode::MkNod,
            Operation::MkDir { .. } => Opcode::MkDir,
            Operation::Unlink { .. } => Opcode::Unlink,
            Operation::RmDir { .. } => Opcode::RmDir,
            Operation::SymLink { .. } => Opcode::SymLink,
            Operation::Rename { .. } => Opcode::Rename,
            Operation::Link { .. } => Opcode::Link,
            Operation::Open { .. } => Opcode::Open,
            Operation::Read { .. } => Opcode::Read,
            Operation::Write { .. } => Opcode::Write,
            Operation::Release { .. } => Opcode::Release,
            Operation::OpenDir { .. } => Opcode::OpenDir,
            Operation::ReadDir { .. } => Opcode::ReadDir,
            Operation::StatFs => Opcode::StatFs,
            Operation::GetXattr { .. } => Opcode::GetXattr,
            Operation::SetXattr { .. } => Opcode::SetXattr,
            Operation::ListXattr { .. } => Opcode::ListXattr,
            Operation::RemoveXattr { .. } => Opcode::RemoveXattr,
            Operation::Create { .. } => Opcode::Create,
        }
    }
}

/// One emitted directory entry.
pub struct DirEntry {
    pub name: OsString,
    pub attr: EntryAttributes,
    pub vnode: Vnode,
}

/// Bounded [`ReaddirReply`] sink handed to the dispatcher.
pub struct DirBuffer {
    entries: Vec<DirEntry>,
    max_entries: usize,
}

impl DirBuffer {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: Vec::new(), max_entries }
    }

    pub fn into_entries(self) -> Vec<DirEntry> {
        self.entries
    }
}

impl ReaddirReply for DirBuffer {
    fn push(&mut self, name: &OsStr, attr: &EntryAttributes, vnode: Vnode) -> bool {
        if self.entries.len() >= self.max_entries {
            return false;
        }
        self.entries.push(DirEntry { name: name.to_os_string(), attr: attr.clone(), vnode });
        true
    }
}

/// Structured result of a served operation.
pub enum OperationReply {
    Entry(EntryAttributes),
    Data(Vec<u8>),
    Written(usize),
    Opened(FileInfo),
    Created(FileInfo, EntryAttributes),
    Directory(Vec<DirEntry>),
    DirHandle(Vnode),
    Target(OsString),
    Names(Vec<OsString>),
    StatFs(StatvfsData),
    Unit,
}

/// Reply container echoing the request identifier.
pub struct Reply {
    pub unique: u64,
    pub result: OpResult<OperationReply>,
}

/// Creates the channel the transport feeds requests into.
pub fn create_request_channel() -> (UnboundedSender<Request>, UnboundedReceiver<Request>) {
    mpsc::unbounded_channel::<Request>()
}

/// Creates the channel replies are drained from.
pub fn create_reply_channel() -> (UnboundedSender<Reply>, UnboundedReceiver<Reply>) {
    mpsc::unbounded_channel::<Reply>()
}

/// Boundary to the kernel transport. The FUSE driver side parses raw
/// kernel messages into [`Request`] values and ships structured
/// replies back; everything beyond this trait is out of scope for the
/// core.
#[async_trait]
pub trait Transport: Send {
    /// The next parsed kernel request; `None` ends the session.
    async fn next_request(&mut self) -> Option<Request>;

    /// Deliver a reply. An error ends the session.
    async fn send_reply(&mut self, reply: Reply) -> io::Result<()>;
}

/// In-process [`Transport`] over a pair of unbounded channels.
pub struct ChannelTransport {
    request_recv: UnboundedReceiver<Request>,
    reply_send: UnboundedSender<Reply>,
}

impl ChannelTransport {
    pub fn new(
        request_recv: UnboundedReceiver<Request>,
        reply_send: UnboundedSender<Reply>,
    ) -> Self {
        Self { request_recv, reply_send }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn next_request(&mut self) -> Option<Request> {
        self.request_recv.recv().await
    }

    async fn send_reply(&mut self, reply: Reply) -> io::Result<()> {
        self.reply_send.send(reply).map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

/// Serves kernel requests against a [`Fusebox`] instance, one at a
/// time, preserving the kernel's ordering.
pub struct SessionTask<T: Transport> {
    fusebox: Fusebox,
    transport: T,
}

impl<T: Transport + 'static> SessionTask<T> {
    /// Spawn the session pump. The handle resolves to the filesystem
    /// instance once the transport runs dry, so the caller can run the
    /// access-log exporter over the final stat sets.
    pub fn spawn(fusebox: Fusebox, transport: T) -> JoinHandle<Fusebox> {
        tokio::spawn(Self { fusebox, transport }.run())
    }

    async fn run(mut self) -> Fusebox {
        while let Some(request) = self.transport.next_request().await {
            let result = self.dispatch(&request.ctx, request.op).await;
            let reply = Reply { unique: request.unique, result };
            if self.transport.send_reply(reply).await.is_err() {
                break;
            }
        }
        self.fusebox
    }

    async fn dispatch(
        &mut self,
        ctx: &RequestContext,
        op: Operation,
    ) -> OpResult<OperationReply> {
        let fs = &mut self.fusebox;
        match op {
            Operation::Lookup { parent, name } => {
                fs.lookup(parent, &name, ctx).await.map(OperationReply::Entry)
            }
            Operation::Forget { pairs } => {
                fs.forget(&pairs).await;
                Ok(OperationReply::Unit)
            }
            Operation::GetAttr { vnode } => {
                fs.getattr(vnode, ctx).await.map(OperationReply::Entry)
            }
            Operation::SetAttr { vnode, attr, fields, fd } => {
                fs.setattr(vnode, &attr, &fields, fd, ctx).await.map(OperationReply::Entry)
            }
            Operation::ReadLink { vnode } => {
                fs.readlink(vnode, ctx).await.map(OperationReply::Target)
            }
            Operation::MkNod { parent, name, mode, rdev } => {
                fs.mknod(parent, &name, mode, rdev, ctx).await.map(OperationReply::Entry)
            }
            Operation::MkDir { parent, name, mode } => {
                fs.mkdir(parent, &name, mode, ctx).await.map(OperationReply::Entry)
            }
            Operation::Unlink { parent, name } => {
                fs.unlink(parent, &name, ctx).await.map(|_| OperationReply::Unit)
            }
            Operation::RmDir { parent, name } => {
                fs.rmdir(parent, &name, ctx).await.map(|_| OperationReply::Unit)
            }
            Operation::SymLink { parent, name, target } => {
                fs.symlink(parent, &name, &target, ctx).await.map(OperationReply::Entry)
            }
            Operation::Rename { old_parent, old_name, new_parent, new_name, flags } => fs
                .rename(old_parent, &old_name, new_parent, &new_name, flags, ctx)
                .await
                .map(|_| OperationReply::Unit),
            Operation::Link { vnode, new_parent, new_name } => {
                fs.link(vnode, new_parent, &new_name, ctx).await.map(OperationReply::Entry)
            }
            Operation::Open { vnode, flags } => {
                fs.open(vnode, flags, ctx).await.map(OperationReply::Opened)
            }
            Operation::Read { fd, offset, length } => {
                fs.read(fd, offset, length).await.map(OperationReply::Data)
            }
            Operation::Write { fd, offset, data } => {
                fs.write(fd, offset, &data).await.map(OperationReply::Written)
            }
            Operation::Release { fd } => fs.release(fd).await.map(|_| OperationReply::Unit),
            Operation::OpenDir { vnode } => {
                fs.opendir(vnode, ctx).await.map(OperationReply::DirHandle)
            }
            Operation::ReadDir { vnode, offset, max_entries } => {
                let mut buffer = DirBuffer::new(max_entries);
                fs.readdir(vnode, offset, &mut buffer).await?;
                Ok(OperationReply::Directory(buffer.into_entries()))
            }
            Operation::StatFs => fs.statfs(ctx).await.map(OperationReply::StatFs),
            Operation::GetXattr { vnode, name } => {
                fs.getxattr(vnode, &name, ctx).await.map(OperationReply::Data)
            }
            Operation::SetXattr { vnode, name, value } => {
                fs.setxattr(vnode, &name, &value, ctx).await.map(|_| OperationReply::Unit)
            }
            Operation::ListXattr { vnode } => {
                fs.listxattr(vnode, ctx).await.map(OperationReply::Names)
            }
            Operation::RemoveXattr { vnode, name } => {
                fs.removexattr(vnode, &name, ctx).await.map(|_| OperationReply::Unit)
            }
            Operation::Create { parent, name, mode, flags } => fs
                .create(parent, &name, mode, flags, ctx)
                .await
                .map(|(info, attr)| OperationReply::Created(info, attr)),
        }
    }
}
