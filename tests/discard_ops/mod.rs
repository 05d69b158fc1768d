use std::ffi::OsStr;

use fusebox::fuse::{Errno, ROOT_VNODE};

use super::common::{ctx, Fixture};

fn discard_source(fixture: &mut Fixture) {
    let source = fixture.source().to_string_lossy().into_owned();
    fixture.fs.auditor.discard_write(source);
}

#[tokio::test]
async fn mkdir_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    discard_source(&mut fixture);

    let attrs = fixture
        .fs
        .mkdir(ROOT_VNODE, OsStr::new("newdir"), 0o755, &ctx())
        .await
        .expect("mkdir succeeds");
    assert!(!fixture.path("newdir").exists());
    assert_eq!(attrs.st_mode & libc::S_IFMT, libc::S_IFDIR);
}

#[tokio::test]
async fn open_write_on_discard_path_swallows_data() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("file1", b"original");
    let vnode = fixture.node("file1").await;
    discard_source(&mut fixture);

    let info = fixture
        .fs
        .open(vnode, libc::O_WRONLY | libc::O_TRUNC, &ctx())
        .await
        .expect("open succeeds despite discard");
    let written = fixture.fs.write(info.fh, 0, b"hello").await.expect("write");
    assert_eq!(written, 5);
    fixture.fs.release(info.fh).await.expect("release");

    // neither the truncate flag nor the write reached the host
    assert_eq!(std::fs::read(fixture.path("file1")).unwrap(), b"original");
}

#[tokio::test]
async fn discard_fd_still_reads_real_content() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("file1", b"readable");
    let vnode = fixture.node("file1").await;
    discard_source(&mut fixture);

    let info = fixture.fs.open(vnode, libc::O_WRONLY, &ctx()).await.expect("open");
    let data = fixture.fs.read(info.fh, 0, 8).await.expect("read");
    assert_eq!(data, b"readable");
    fixture.fs.release(info.fh).await.expect("release");
}

#[tokio::test]
async fn unlink_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("file1", b"x");
    discard_source(&mut fixture);

    fixture.fs.unlink(ROOT_VNODE, OsStr::new("file1"), &ctx()).await.expect("unlink");
    assert!(fixture.path("file1").exists());
}

#[tokio::test]
async fn rmdir_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    fixture.create_dir("dir1");
    discard_source(&mut fixture);

    fixture.fs.rmdir(ROOT_VNODE, OsStr::new("dir1"), &ctx()).await.expect("rmdir");
    assert!(fixture.path("dir1").is_dir());
}

#[tokio::test]
async fn create_binds_discard_target_to_null_sink() {
    let mut fixture = Fixture::permissive();
    discard_source(&mut fixture);

    let (info, attrs) = fixture
        .fs
        .create(ROOT_VNODE, OsStr::new("fresh"), 0o644, libc::O_WRONLY, &ctx())
        .await
        .expect("create succeeds");
    assert!(!fixture.path("fresh").exists());
    assert_eq!(attrs.st_mode & libc::S_IFMT, libc::S_IFREG);

    // writes vanish, reads come back empty
    assert_eq!(fixture.fs.write(info.fh, 0, b"gone").await.expect("write"), 4);
    assert_eq!(fixture.fs.read(info.fh, 0, 16).await.expect("read"), b"");
    fixture.fs.release(info.fh).await.expect("release");

    // the faked path keeps resolving through the null sink
    let resolved = fixture.lookup(ROOT_VNODE, "fresh").await.expect("lookup faked path");
    assert_eq!(resolved.st_ino, attrs.st_ino);
}

#[tokio::test]
async fn symlink_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    discard_source(&mut fixture);

    let attrs = fixture
        .fs
        .symlink(ROOT_VNODE, OsStr::new("link1"), OsStr::new("/elsewhere"), &ctx())
        .await
        .expect("symlink");
    assert!(!fixture.path("link1").exists());
    assert_eq!(attrs.st_mode & libc::S_IFMT, libc::S_IFREG);
}

#[tokio::test]
async fn link_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("file1", b"x");
    let vnode = fixture.node("file1").await;
    discard_source(&mut fixture);

    fixture
        .fs
        .link(vnode, ROOT_VNODE, OsStr::new("file2"), &ctx())
        .await
        .expect("link");
    assert!(!fixture.path("file2").exists());
    let record = fixture.fs.vm.record(vnode).unwrap();
    assert!(!record.paths().contains(&fixture.path("file2")));
}

#[tokio::test]
async fn mknod_is_faked_for_discard_targets() {
    let mut fixture = Fixture::permissive();
    discard_source(&mut fixture);

    let attrs = fixture
        .fs
        .mknod(ROOT_VNODE, OsStr::new("fifo1"), libc::S_IFIFO | 0o644, 0, &ctx())
        .await
        .expect("mknod");
    assert!(!fixture.path("fifo1").exists());
    assert_eq!(attrs.st_ino, fixture.fs.controllers().null);
}

#[tokio::test]
async fn deny_still_wins_over_earlier_discard() {
    let mut fixture = Fixture::permissive();
    discard_source(&mut fixture);
    let blocked = fixture.path("blocked");
    fixture.fs.auditor.deny_write(blocked.to_string_lossy().into_owned());

    let err = fixture.fs.mkdir(ROOT_VNODE, OsStr::new("blocked"), 0o755, &ctx()).await.unwrap_err();
    assert_eq!(err, Errno::ACCES);
}
