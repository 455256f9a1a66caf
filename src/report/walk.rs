//! Filesystem record source.

use std::path::PathBuf;
use tracing::warn;
use walkdir::WalkDir;

/// Every non-directory path below `roots`, root by root.
///
/// Unreadable directories are reported and skipped; the walk carries on
/// with whatever remains. Symlinks are yielded but not followed.
pub fn walk_paths(roots: &[PathBuf]) -> impl Iterator<Item = PathBuf> + '_ {
    roots.iter().flat_map(|root| {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) if entry.file_type().is_dir() => None,
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    warn!("Error: {} ({})", path, e);
                    None
                }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn yields_files_from_every_root() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        fs::create_dir_all(a.path().join("nested/deeper")).unwrap();
        fs::write(a.path().join("top.txt"), "x").unwrap();
        fs::write(a.path().join("nested/deeper/leaf.txt"), "xy").unwrap();
        fs::write(b.path().join("other.txt"), "xyz").unwrap();

        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let mut found: Vec<_> = walk_paths(&roots).collect();
        found.sort();

        let mut expected = vec![
            a.path().join("nested/deeper/leaf.txt"),
            a.path().join("top.txt"),
            b.path().join("other.txt"),
        ];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn missing_root_is_skipped() {
        let a = TempDir::new().unwrap();
        fs::write(a.path().join("only.txt"), "x").unwrap();

        let roots = vec![a.path().join("does-not-exist"), a.path().to_path_buf()];
        let found: Vec<_> = walk_paths(&roots).collect();
        assert_eq!(found, vec![a.path().join("only.txt")]);
    }
}
