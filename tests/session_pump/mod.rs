use std::ffi::OsString;

use fusebox::fuse::{RequestContext, ROOT_VNODE};
use fusebox::pseudo::CONTROLLER_FILENAME;
use fusebox::session::{
    create_reply_channel, create_request_channel, ChannelTransport, Operation, OperationReply,
    Request, SessionTask,
};

use super::common::Fixture;

#[tokio::test]
async fn session_serves_requests_in_order_and_returns_the_instance() {
    let fixture = Fixture::permissive();
    fixture.write_file("file1", b"payload");
    let source = fixture.source();

    let (request_send, request_recv) = create_request_channel();
    let (reply_send, mut reply_recv) = create_reply_channel();
    let session = SessionTask::spawn(fixture.fs, ChannelTransport::new(request_recv, reply_send));

    let ops = [
        Operation::ReadDir { vnode: ROOT_VNODE, offset: 0, max_entries: 64 },
        Operation::Lookup { parent: ROOT_VNODE, name: OsString::from("file1") },
        Operation::StatFs,
    ];
    for (unique, op) in ops.into_iter().enumerate() {
        request_send
            .send(Request { unique: unique as u64, ctx: RequestContext::default(), op })
            .expect("send request");
    }

    let listing = reply_recv.recv().await.expect("readdir reply");
    assert_eq!(listing.unique, 0);
    match listing.result.expect("readdir succeeds") {
        OperationReply::Directory(entries) => {
            assert!(entries.iter().any(|entry| entry.name == *CONTROLLER_FILENAME));
        }
        _ => panic!("readdir must reply with a directory"),
    }

    let lookup = reply_recv.recv().await.expect("lookup reply");
    assert_eq!(lookup.unique, 1);
    let file_vnode = match lookup.result.expect("lookup succeeds") {
        OperationReply::Entry(attr) => attr.st_ino,
        _ => panic!("lookup must reply with an entry"),
    };

    let statfs = reply_recv.recv().await.expect("statfs reply");
    assert_eq!(statfs.unique, 2);
    assert!(matches!(statfs.result, Ok(OperationReply::StatFs(_))));

    request_send
        .send(Request {
            unique: 3,
            ctx: RequestContext::default(),
            op: Operation::Open { vnode: file_vnode, flags: libc::O_RDONLY },
        })
        .expect("send open");
    let opened = reply_recv.recv().await.expect("open reply");
    let fd = match opened.result.expect("open succeeds") {
        OperationReply::Opened(info) => info.fh,
        _ => panic!("open must reply with a handle"),
    };
    request_send
        .send(Request {
            unique: 4,
            ctx: RequestContext::default(),
            op: Operation::Read { fd, offset: 0, length: 7 },
        })
        .expect("send read");
    let read = reply_recv.recv().await.expect("read reply");
    match read.result.expect("read succeeds") {
        OperationReply::Data(data) => assert_eq!(data, b"payload"),
        _ => panic!("read must reply with data"),
    }

    drop(request_send);
    let fs = session.await.expect("session task joins");
    assert!(fs.stat_path_open_r.contains(&source.join("file1")));
}
