//! Drives the overlay dispatcher through the session channel without a
//! kernel transport: lists the overlay root, reconfigures the auditor
//! through the `acl` control file, and dumps the access log.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing_subscriber::EnvFilter;

use fusebox::config::Config;
use fusebox::fuse::{RequestContext, ROOT_VNODE};
use fusebox::session::{
    create_reply_channel, create_request_channel, ChannelTransport, Operation, OperationReply,
    Reply, Request, SessionTask,
};
use fusebox::{access_log, Fusebox};

#[derive(Parser)]
#[command(about = "Walk a fusebox overlay without mounting it")]
struct Args {
    /// Overlay source directory.
    source: PathBuf,
    /// Host directory the overlay would be attached at.
    mountpoint: PathBuf,
    /// Optional TOML configuration with initial policy.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base path for the access-log export.
    #[arg(long)]
    logfile: Option<PathBuf>,
    /// Verbose operation tracing.
    #[arg(long)]
    debug: bool,
}

struct Driver {
    request_send: UnboundedSender<Request>,
    reply_recv: UnboundedReceiver<Reply>,
    unique: u64,
}

impl Driver {
    async fn call(&mut self, op: Operation) -> OperationReply {
        self.unique += 1;
        let request = Request { unique: self.unique, ctx: RequestContext::default(), op };
        self.request_send.send(request).expect("session alive");
        let reply = self.reply_recv.recv().await.expect("session alive");
        assert_eq!(reply.unique, self.unique);
        reply.result.expect("operation succeeds")
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut fs = Fusebox::new(&args.source, &args.mountpoint).expect("construct overlay");
    if let Some(path) = &args.config {
        match Config::load(path).await {
            Ok(config) => config.apply(&mut fs),
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
    }

    let (request_send, request_recv) = create_request_channel();
    let (reply_send, reply_recv) = create_reply_channel();
    let session = SessionTask::spawn(fs, ChannelTransport::new(request_recv, reply_send));
    let mut driver = Driver { request_send, reply_recv, unique: 0 };

    // List the overlay root: host entries plus the injected controller.
    let listing = driver
        .call(Operation::ReadDir { vnode: ROOT_VNODE, offset: 0, max_entries: 64 })
        .await;
    if let OperationReply::Directory(entries) = listing {
        println!("overlay root:");
        for entry in entries {
            println!("  {} (ino {})", entry.name.to_string_lossy(), entry.vnode);
        }
    }

    // Reconfigure the auditor through the in-filesystem control file.
    let ctl = driver
        .call(Operation::Lookup { parent: ROOT_VNODE, name: OsString::from("fuseboxctlv1") })
        .await;
    let ctl_vnode = match ctl {
        OperationReply::Entry(attr) => attr.st_ino,
        _ => unreachable!("lookup replies with an entry"),
    };
    let acl = driver
        .call(Operation::Lookup { parent: ctl_vnode, name: OsString::from("acl") })
        .await;
    let acl_vnode = match acl {
        OperationReply::Entry(attr) => attr.st_ino,
        _ => unreachable!("lookup replies with an entry"),
    };
    let opened = driver
        .call(Operation::Open { vnode: acl_vnode, flags: libc::O_WRONLY | libc::O_TRUNC })
        .await;
    let fd = match opened {
        OperationReply::Opened(info) => info.fh,
        _ => unreachable!("open replies with a handle"),
    };
    let commands = format!("allowread {}\n", args.source.display());
    driver.call(Operation::Write { fd, offset: 0, data: commands.into_bytes() }).await;
    driver.call(Operation::Release { fd }).await;

    // Read the rendered policy back.
    let opened = driver.call(Operation::Open { vnode: acl_vnode, flags: libc::O_RDONLY }).await;
    let fd = match opened {
        OperationReply::Opened(info) => info.fh,
        _ => unreachable!("open replies with a handle"),
    };
    let data = driver.call(Operation::Read { fd, offset: 0, length: 4096 }).await;
    if let OperationReply::Data(bytes) = data {
        println!("active policy:\n{}", String::from_utf8_lossy(&bytes));
    }
    driver.call(Operation::Release { fd }).await;

    drop(driver);
    let fs = session.await.expect("session task");
    if let Some(base) = &args.logfile {
        access_log::export(&fs, base).await.expect("export access log");
        println!("access log written to {}.{{r,w,rw}}.txt", base.display());
    }
}
