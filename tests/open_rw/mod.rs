use fusebox::auditor::SecurityModel;
use fusebox::fuse::{Errno, Fd};

use super::common::{ctx, Fixture};

#[tokio::test]
async fn whitelist_gates_open_until_rule_added() {
    let mut fixture = Fixture::new();
    fixture.fs.auditor.security_model = SecurityModel::Whitelist;
    fixture.write_file("file1", b"payload");

    let vnode = fixture.node("file1").await;
    let err = fixture.fs.open(vnode, libc::O_RDONLY, &ctx()).await.unwrap_err();
    assert_eq!(err, Errno::ACCES);

    let source = fixture.source();
    fixture.fs.auditor.allow_read(source.to_string_lossy().into_owned());
    let info = fixture.fs.open(vnode, libc::O_RDONLY, &ctx()).await.expect("open succeeds");
    assert!(fixture.fs.stat_path_open_r.contains(&fixture.path("file1")));
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn write_only_open_requires_write_rule() {
    let mut fixture = Fixture::new();
    fixture.write_file("file1", b"x");
    let vnode = fixture.node("file1").await;

    let source = fixture.source().to_string_lossy().into_owned();
    fixture.fs.auditor.allow_read(source.clone());
    let err = fixture.fs.open(vnode, libc::O_WRONLY, &ctx()).await.unwrap_err();
    assert_eq!(err, Errno::ACCES);

    fixture.fs.auditor.allow_write(source);
    let info = fixture.fs.open(vnode, libc::O_WRONLY, &ctx()).await.expect("open succeeds");
    assert!(fixture.fs.stat_path_open_w.contains(&fixture.path("file1")));
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn read_write_open_requires_both_rules() {
    let mut fixture = Fixture::new();
    fixture.write_file("file1", b"x");
    let vnode = fixture.node("file1").await;

    let source = fixture.source().to_string_lossy().into_owned();
    fixture.fs.auditor.allow_write(source.clone());
    let err = fixture.fs.open(vnode, libc::O_RDWR, &ctx()).await.unwrap_err();
    assert_eq!(err, Errno::ACCES);

    fixture.fs.auditor.allow_read(source);
    let info = fixture.fs.open(vnode, libc::O_RDWR, &ctx()).await.expect("open succeeds");
    assert!(fixture.fs.stat_path_open_rw.contains(&fixture.path("file1")));
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn write_and_read_roundtrip() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("notes.txt", b"abcdefghijklmnopqrstuvwxyz");
    let vnode = fixture.node("notes.txt").await;

    let info = fixture.fs.open(vnode, libc::O_RDWR, &ctx()).await.expect("open");
    let written = fixture.fs.write(info.fh, 2, b"XYZ").await.expect("write");
    assert_eq!(written, 3);
    let data = fixture.fs.read(info.fh, 0, 6).await.expect("read");
    assert_eq!(data, b"abXYZf");
    fixture.fs.release(info.fh).await.expect("release");

    assert_eq!(std::fs::read(fixture.path("notes.txt")).unwrap(), b"abXYZfghijklmnopqrstuvwxyz");
}

#[tokio::test]
async fn read_past_end_is_short() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("short.txt", b"abc");
    let vnode = fixture.node("short.txt").await;

    let info = fixture.fs.open(vnode, libc::O_RDONLY, &ctx()).await.expect("open");
    let data = fixture.fs.read(info.fh, 10, 16).await.expect("read past eof");
    assert!(data.is_empty());
    let data = fixture.fs.read(info.fh, 1, 16).await.expect("short read");
    assert_eq!(data, b"bc");
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn unlinked_file_stays_usable_through_fd() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("doomed.txt", b"still here");
    let vnode = fixture.node("doomed.txt").await;

    let info = fixture.fs.open(vnode, libc::O_RDWR, &ctx()).await.expect("open");
    fixture.fs.unlink(fusebox::fuse::ROOT_VNODE, "doomed.txt".as_ref(), &ctx())
        .await
        .expect("unlink");
    assert!(!fixture.path("doomed.txt").exists());

    let data = fixture.fs.read(info.fh, 0, 5).await.expect("read after unlink");
    assert_eq!(data, b"still");
    let written = fixture.fs.write(info.fh, 0, b"STILL").await.expect("write after unlink");
    assert_eq!(written, 5);
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn release_unknown_fd_fails() {
    let mut fixture = Fixture::permissive();
    let err = fixture.fs.release(Fd(777)).await.unwrap_err();
    assert_eq!(err, Errno::NOENT);
}

#[tokio::test]
async fn read_on_unknown_fd_fails() {
    let mut fixture = Fixture::permissive();
    let err = fixture.fs.read(Fd(777), 0, 16).await.unwrap_err();
    assert_eq!(err, Errno::NOENT);
}
