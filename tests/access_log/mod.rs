use fusebox::access_log;
use fusebox::fuse::ROOT_VNODE;

use super::common::{ctx, Fixture};

#[tokio::test]
async fn export_writes_three_sorted_files() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("zulu", b"z");
    fixture.write_file("alpha", b"a");
    fixture.write_file("mike", b"m");

    for (name, flags) in
        [("zulu", libc::O_RDONLY), ("alpha", libc::O_RDONLY), ("mike", libc::O_WRONLY)]
    {
        let vnode = fixture.node(name).await;
        let info = fixture.fs.open(vnode, flags, &ctx()).await.expect("open");
        fixture.fs.release(info.fh).await.expect("release");
    }
    let rw = fixture.node("zulu").await;
    let info = fixture.fs.open(rw, libc::O_RDWR, &ctx()).await.expect("open rw");
    fixture.fs.release(info.fh).await.expect("release");

    let base = fixture.tempdir.path().join("accesslog");
    access_log::export(&fixture.fs, &base).await.expect("export");

    let read_log = std::fs::read_to_string(fixture.tempdir.path().join("accesslog.r.txt")).unwrap();
    let lines: Vec<String> = read_log.lines().map(str::to_owned).collect();
    assert_eq!(
        lines,
        vec![
            fixture.path("alpha").to_string_lossy().into_owned(),
            fixture.path("zulu").to_string_lossy().into_owned(),
        ]
    );

    let write_log =
        std::fs::read_to_string(fixture.tempdir.path().join("accesslog.w.txt")).unwrap();
    assert_eq!(write_log, format!("{}\n", fixture.path("mike").display()));

    let rw_log = std::fs::read_to_string(fixture.tempdir.path().join("accesslog.rw.txt")).unwrap();
    assert_eq!(rw_log, format!("{}\n", fixture.path("zulu").display()));
}

#[tokio::test]
async fn pseudo_and_discard_opens_are_not_recorded() {
    let mut fixture = Fixture::permissive();
    fixture.write_file("quiet", b"x");
    let vnode = fixture.node("quiet").await;
    fixture.fs.auditor.discard_write(fixture.path("quiet").to_string_lossy().into_owned());

    let info = fixture.fs.open(vnode, libc::O_WRONLY, &ctx()).await.expect("open discard");
    fixture.fs.release(info.fh).await.expect("release");

    let ctl = fixture.node(fusebox::pseudo::CONTROLLER_FILENAME).await;
    let acl = fixture.lookup(ctl, "acl").await.expect("lookup acl").st_ino;
    let info = fixture.fs.open(acl, libc::O_RDONLY, &ctx()).await.expect("open acl");
    fixture.fs.release(info.fh).await.expect("release");

    assert!(fixture.fs.stat_path_open_r.is_empty());
    assert!(fixture.fs.stat_path_open_w.is_empty());
    assert!(fixture.fs.stat_path_open_rw.is_empty());
    assert_eq!(fixture.fs.getattr(ROOT_VNODE, &ctx()).await.unwrap().st_ino, ROOT_VNODE);
}
