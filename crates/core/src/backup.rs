//! Zip archive helpers for repository backup and restore.

use crate::constants::REPOSITORY_DIRS;
use crate::{RepoResult, RepositoryError};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Which logical subdirectories a backup or restore covers. Everything is
/// included by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupSelection {
    pub documents: bool,
    pub users: bool,
    pub projects: bool,
    pub reports: bool,
    pub logs: bool,
}

impl Default for BackupSelection {
    fn default() -> Self {
        Self {
            documents: true,
            users: true,
            projects: true,
            reports: true,
            logs: true,
        }
    }
}

impl BackupSelection {
    pub fn all() -> Self {
        Self::default()
    }

    fn included(&self, dir: &str) -> bool {
        match dir {
            "documents" => self.documents,
            "users" => self.users,
            "projects" => self.projects,
            "reports" => self.reports,
            "logs" => self.logs,
            _ => true,
        }
    }

    /// The logical subdirectory names this selection excludes.
    pub fn excluded(&self) -> Vec<&'static str> {
        REPOSITORY_DIRS
            .iter()
            .copied()
            .filter(|dir| !self.included(dir))
            .collect()
    }
}

/// Probes `<name>.zip`, `<name>_1.zip`, `<name>_2.zip`, ... and returns the
/// first path that does not exist yet.
pub fn unique_archive_path(destination: &Path, name: &str) -> PathBuf {
    let plain = destination.join(format!("{name}.zip"));
    if !plain.exists() {
        return plain;
    }
    let mut counter = 1u64;
    loop {
        let candidate = destination.join(format!("{name}_{counter}.zip"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Archives a directory tree into a zip file. Directory entries are written
/// too, so empty subdirectories survive a round trip.
pub fn archive_dir(source: &Path, archive: &Path) -> RepoResult<()> {
    let file = File::create(archive)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    append_dir(&mut writer, source, Path::new(""), options)?;
    writer
        .finish()
        .map_err(|error| RepositoryError::Archive(error.to_string()))?;
    Ok(())
}

fn append_dir(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &Path,
    options: FileOptions,
) -> RepoResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let relative = prefix.join(entry.file_name());
        let name = relative.to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            writer
                .add_directory(&name, options)
                .map_err(|error| RepositoryError::Archive(error.to_string()))?;
            append_dir(writer, &entry.path(), &relative, options)?;
        } else {
            writer
                .start_file(&name, options)
                .map_err(|error| RepositoryError::Archive(error.to_string()))?;
            let mut source = File::open(entry.path())?;
            io::copy(&mut source, writer)?;
        }
    }
    Ok(())
}

/// Extracts a zip archive into a directory.
pub fn extract_archive(archive: &Path, destination: &Path) -> RepoResult<()> {
    let file = File::open(archive)?;
    let mut reader =
        ZipArchive::new(file).map_err(|error| RepositoryError::Archive(error.to_string()))?;
    reader
        .extract(destination)
        .map_err(|error| RepositoryError::Archive(error.to_string()))?;
    Ok(())
}
