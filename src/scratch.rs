//! Scoped working directories and moving finished files into place.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use tracing::warn;

/// Create a working directory under `root`, or under the system temp dir
/// when `root` is `None`. It is removed when the guard drops.
pub fn scoped_dir(prefix: &str, root: Option<&Path>) -> io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
}

/// Remove the files of `workdir` that `is_leftover` picks, then the
/// directory with whatever is left. Failures are logged, not returned.
pub fn clean_up(workdir: TempDir, is_leftover: impl Fn(&Path) -> bool) {
    if let Ok(entries) = fs::read_dir(workdir.path()) {
        for path in entries.flatten().map(|entry| entry.path()) {
            if is_leftover(&path)
                && let Err(e) = fs::remove_file(&path)
            {
                warn!("Cannot remove {}: {}", path.display(), e);
            }
        }
    }
    let path = workdir.path().to_path_buf();
    if let Err(e) = workdir.close() {
        warn!("Cannot remove {}: {}", path.display(), e);
    }
}

/// Rename `from` to `to`, falling back to copy and delete across
/// filesystems.
///
/// The copy goes to a staging file next to `to` and is renamed over it
/// once complete, so a failed copy leaves whatever was at `to` untouched.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    let dir = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    io::copy(&mut File::open(from)?, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(to).map_err(|e| e.error)?;
    fs::remove_file(from)
}
