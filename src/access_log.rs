//! Dumps the recorded open-path sets to plaintext files at shutdown.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::fusefs::Fusebox;

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn render(paths: &BTreeSet<PathBuf>) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str(&path.to_string_lossy());
        out.push('\n');
    }
    out
}

/// Write `<base>.r.txt`, `<base>.w.txt` and `<base>.rw.txt`: sorted,
/// newline-separated absolute paths opened under the respective modes.
pub async fn export(fusebox: &Fusebox, base: &Path) -> io::Result<()> {
    tokio::fs::write(with_suffix(base, ".r.txt"), render(&fusebox.stat_path_open_r)).await?;
    tokio::fs::write(with_suffix(base, ".w.txt"), render(&fusebox.stat_path_open_w)).await?;
    tokio::fs::write(with_suffix(base, ".rw.txt"), render(&fusebox.stat_path_open_rw)).await?;
    Ok(())
}
