//! Shared filesystem utilities.
//!
//! This module contains the identifier allocator and the directory/file
//! helpers used by every manager and by the repository facade.

use crate::{RepoResult, RepositoryError};
use std::fs;
use std::path::Path;

/// Calculates the next available identifier for a collection directory.
///
/// Immediate children of `dir` whose names parse as integers are the existing
/// identifiers; names that do not parse are ignored. An empty collection
/// starts at 1.
///
/// Not safe under concurrent callers: the scan and the subsequent use of the
/// returned identifier are separate steps. Repositories assume a single
/// writer per process.
///
/// # Errors
///
/// Returns `RepositoryError::MissingPath` if `dir` does not exist.
pub fn next_id(dir: &Path) -> RepoResult<u64> {
    Ok(existing_ids(dir)?.into_iter().max().unwrap_or(0) + 1)
}

/// Lists the integer-named immediate children of a collection directory.
///
/// # Errors
///
/// Returns `RepositoryError::MissingPath` if `dir` does not exist.
pub fn existing_ids(dir: &Path) -> RepoResult<Vec<u64>> {
    if !dir.exists() {
        return Err(RepositoryError::MissingPath(dir.to_path_buf()));
    }

    let mut ids = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(id) = entry.file_name().to_str().and_then(|name| name.parse().ok()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Recursively copies a directory and its contents to a destination.
///
/// Creates the destination directory if it doesn't exist and copies all
/// files and subdirectories from the source to the destination.
///
/// # Errors
///
/// Returns an `std::io::Error` if:
/// - creating the destination directory fails,
/// - reading source directory entries fails,
/// - inspecting entry types fails,
/// - copying a file fails.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)?;
    }

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

/// Moves a file into a directory, keeping its base name.
///
/// Staged files can live on another filesystem (e.g. `/tmp`), where a plain
/// rename fails with `EXDEV`; in that case the file is copied and the source
/// removed.
///
/// # Errors
///
/// Returns `RepositoryError::MissingPath` if `source` does not exist, or an
/// I/O error if the rename and the copy-then-remove fallback both fail.
pub fn move_file_into(source: &Path, dest_dir: &Path) -> RepoResult<()> {
    let file_name = source
        .file_name()
        .ok_or_else(|| RepositoryError::MissingPath(source.to_path_buf()))?;
    if !source.exists() {
        return Err(RepositoryError::MissingPath(source.to_path_buf()));
    }

    let destination = dest_dir.join(file_name);
    if fs::rename(source, &destination).is_err() {
        fs::copy(source, &destination)?;
        fs::remove_file(source)?;
    }
    Ok(())
}

/// Removes every entry inside a directory while keeping the directory itself.
pub fn empty_dir(dir: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_next_id_empty_collection() {
        let temp = TempDir::new().unwrap();
        assert_eq!(next_id(temp.path()).unwrap(), 1);
    }

    #[test]
    fn test_next_id_is_max_plus_one() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("1")).unwrap();
        fs::create_dir(temp.path().join("7")).unwrap();
        fs::write(temp.path().join("3"), "user file").unwrap();
        assert_eq!(next_id(temp.path()).unwrap(), 8);
    }

    #[test]
    fn test_next_id_ignores_non_integer_names() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("2")).unwrap();
        fs::write(temp.path().join("roles.txt"), "").unwrap();
        fs::write(temp.path().join("notes"), "").unwrap();
        assert_eq!(next_id(temp.path()).unwrap(), 3);
    }

    #[test]
    fn test_next_id_never_reuses_removed_ids_below_max() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("1")).unwrap();
        fs::create_dir(temp.path().join("2")).unwrap();
        fs::create_dir(temp.path().join("3")).unwrap();
        fs::remove_dir(temp.path().join("2")).unwrap();
        assert_eq!(next_id(temp.path()).unwrap(), 4);
    }

    #[test]
    fn test_next_id_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = next_id(&temp.path().join("absent"));
        assert!(matches!(result, Err(RepositoryError::MissingPath(_))));
    }

    #[test]
    fn test_move_file_into() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.txt");
        fs::write(&staged, "payload").unwrap();
        let dest = temp.path().join("doc");
        fs::create_dir(&dest).unwrap();

        move_file_into(&staged, &dest).unwrap();

        assert!(!staged.exists());
        assert_eq!(fs::read_to_string(dest.join("staged.txt")).unwrap(), "payload");
    }

    #[test]
    fn test_move_file_into_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = move_file_into(&temp.path().join("absent.txt"), temp.path());
        assert!(matches!(result, Err(RepositoryError::MissingPath(_))));
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        fs::write(src.join("nested/b.txt"), "b").unwrap();

        let dst = temp.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_empty_dir_keeps_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("target");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("file"), "x").unwrap();

        empty_dir(&dir).unwrap();

        assert!(dir.exists());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }
}
