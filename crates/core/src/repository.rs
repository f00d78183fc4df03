//! The repository facade.
//!
//! A repository is a dedicated directory with a fixed layout:
//!
//! ```text
//! <root>/
//!     documents/            document directories and metadata
//!     logs/                 event logs
//!     projects/             project directories
//!     reports/              generated reports
//!     users/                user records and the roles file
//!     paths.edr             path-mapping record
//!     <basename>_metadata.edr   creation and last-backup dates
//! ```
//!
//! Opening a repository either loads this layout or initialises it once;
//! the managers are then bound to the subdirectories. Cross-entity
//! operations (import, export, backup, restore) live here because they
//! orchestrate more than one manager.

use crate::backup::{archive_dir, extract_archive, unique_archive_path, BackupSelection};
use crate::config::RepositoryConfig;
use crate::constants::{
    BACKUP_FREQUENCY_DAYS, DOCUMENTS_DIR_NAME, METADATA_EXT, PATHS_FILE_NAME, PROJECTS_DIR_NAME,
    REPOSITORY_DIRS, USERS_DIR_NAME,
};
use crate::document::{Document, DocumentManager};
use crate::project::ProjectManager;
use crate::roles::{RoleStore, RolesEncoding};
use crate::storage::{copy_dir_recursive, empty_dir, existing_ids};
use crate::timestamp::{epoch, format_timestamp, from_components, now_micros, to_components};
use crate::user::UserManager;
use crate::{RepoResult, RepositoryError};
use chrono::{NaiveDateTime, Utc};
use edr_inifmt::{format_list, read_ini_file, write_ini_file, IniData, IniSection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A document repository rooted at one directory.
#[derive(Debug)]
pub struct Repository {
    name: String,
    location: PathBuf,
    metadata_file: PathBuf,
    paths_file: PathBuf,
    creation_date: NaiveDateTime,
}

impl Repository {
    /// Opens the repository at the configured location, initialising the
    /// directory layout on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotADirectory` if the location exists but
    /// is a file, or a Format-kind error if the metadata record of an
    /// existing repository is unreadable.
    pub fn open(config: RepositoryConfig) -> RepoResult<Self> {
        let location = config.location;
        let basename = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RepositoryError::MissingPath(location.clone()))?;
        let metadata_file = location.join(format!("{basename}_metadata.{METADATA_EXT}"));
        let paths_file = location.join(PATHS_FILE_NAME);

        let mut repository = Self {
            name: config.name,
            location,
            metadata_file,
            paths_file,
            creation_date: epoch(),
        };

        if repository.location.exists() {
            if !repository.location.is_dir() {
                return Err(RepositoryError::NotADirectory(repository.location));
            }
            repository.creation_date = repository.read_metadata_date("creation_date")?;
        } else {
            repository.initialize(config.roles_encoding)?;
        }
        Ok(repository)
    }

    /// Creates the whole layout: the five subdirectories, an empty roles
    /// file, the path-mapping record and the metadata record with the
    /// creation date and the never-backed-up sentinel.
    fn initialize(&mut self, roles_encoding: RolesEncoding) -> RepoResult<()> {
        fs::create_dir_all(&self.location)?;
        for dir in REPOSITORY_DIRS {
            fs::create_dir(self.location.join(dir))?;
        }
        RoleStore::new(self.dir(USERS_DIR_NAME)).initialize(roles_encoding)?;
        self.write_paths_file()?;

        self.creation_date = now_micros();
        // The Unix epoch marks a repository that was never backed up.
        self.write_metadata(self.creation_date, epoch())?;
        info!(name = %self.name, location = %self.location.display(), "initialized repository");
        Ok(())
    }

    fn write_paths_file(&self) -> RepoResult<()> {
        let directories: IniSection = REPOSITORY_DIRS
            .iter()
            .map(|dir| ((*dir).to_owned(), (*dir).to_owned()))
            .collect();
        let files = IniSection::from([
            (
                "repo_main_folder".to_owned(),
                self.basename().into_owned(),
            ),
            ("paths".to_owned(), PATHS_FILE_NAME.to_owned()),
            (
                "metadata".to_owned(),
                format!("{}_metadata.{METADATA_EXT}", self.basename()),
            ),
        ]);
        let data = IniData::from([
            ("directories".to_owned(), directories),
            ("files".to_owned(), files),
        ]);
        write_ini_file(&self.paths_file, &data)?;
        Ok(())
    }

    fn basename(&self) -> std::borrow::Cow<'_, str> {
        self.location
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default()
    }

    fn write_metadata(
        &self,
        creation: NaiveDateTime,
        last_backup: NaiveDateTime,
    ) -> RepoResult<()> {
        let data = IniData::from([
            ("creation_date".to_owned(), to_components(&creation)),
            ("last_backup_date".to_owned(), to_components(&last_backup)),
        ]);
        write_ini_file(&self.metadata_file, &data)?;
        Ok(())
    }

    fn read_metadata_date(&self, section: &str) -> RepoResult<NaiveDateTime> {
        let data = read_ini_file(&self.metadata_file)?;
        let record = data.get(section).ok_or_else(|| {
            RepositoryError::MalformedRecord(format!(
                "repository metadata has no [{section}] section"
            ))
        })?;
        from_components(record)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The absolute root path of the repository.
    pub fn absolute_path(&self) -> RepoResult<PathBuf> {
        if self.location.is_absolute() {
            Ok(self.location.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.location))
        }
    }

    pub fn creation_date(&self) -> NaiveDateTime {
        self.creation_date
    }

    /// The recorded date of the last backup; the Unix epoch if there never
    /// was one.
    pub fn last_backup_date(&self) -> RepoResult<NaiveDateTime> {
        self.read_metadata_date("last_backup_date")
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.location.join(name)
    }

    /// A document manager bound to this repository.
    pub fn documents(&self) -> RepoResult<DocumentManager> {
        DocumentManager::new(self.dir(DOCUMENTS_DIR_NAME))
    }

    /// A user manager bound to this repository.
    pub fn users(&self) -> RepoResult<UserManager> {
        UserManager::new(self.dir(USERS_DIR_NAME))
    }

    /// A project manager bound to this repository.
    pub fn projects(&self) -> RepoResult<ProjectManager> {
        ProjectManager::new(self.dir(PROJECTS_DIR_NAME))
    }

    /// Imports document directories from another location.
    ///
    /// Integer-named subdirectories of `source` are copied wholesale under
    /// the same identifier, then validated: the record must load, the author
    /// list must be non-empty and every registered file must exist. A
    /// document that fails validation has its copy deleted and the error
    /// propagates; documents imported before it stay imported. The import
    /// is deliberately not atomic.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingPath` / `NotADirectory` /
    /// `EmptySource` for an unusable source, and `ImportIdCollision` when a
    /// document with the same id already exists.
    pub fn import_documents(&self, source: &Path) -> RepoResult<Vec<u64>> {
        if !source.exists() {
            return Err(RepositoryError::MissingPath(source.to_path_buf()));
        }
        if !source.is_dir() {
            return Err(RepositoryError::NotADirectory(source.to_path_buf()));
        }
        let mut ids = existing_ids(source)?;
        if ids.is_empty() {
            return Err(RepositoryError::EmptySource(source.to_path_buf()));
        }
        ids.sort_unstable();

        let manager = self.documents()?;
        let mut imported = Vec::with_capacity(ids.len());
        for id in ids {
            let target = manager.document_dir(id);
            if target.exists() {
                return Err(RepositoryError::ImportIdCollision(id));
            }
            let copied = copy_dir_recursive(&source.join(id.to_string()), &target)
                .map_err(RepositoryError::Io)
                .and_then(|_| self.validate_imported(&manager, id));
            if let Err(error) = copied {
                // A half-copied or invalid document must not block a retry.
                let _ = fs::remove_dir_all(&target);
                return Err(error);
            }
            imported.push(id);
        }
        info!(count = imported.len(), "imported documents");
        Ok(imported)
    }

    fn validate_imported(&self, manager: &DocumentManager, id: u64) -> RepoResult<()> {
        let users = self.users()?;
        let document = manager.load_with(id, Some(&users))?;
        if document.authors().is_empty() {
            return Err(RepositoryError::NoAuthors(id));
        }
        for (file, exists) in manager.files_exist(id)? {
            if !exists {
                return Err(RepositoryError::MissingDocumentFile { id, file });
            }
        }
        Ok(())
    }

    /// Exports documents to a destination directory.
    ///
    /// Every requested document must be accepted and public; the check runs
    /// before anything is written for that id. The payload files are copied
    /// and a public metadata record `<id>.edr` is written with the author
    /// display names instead of ids and without the state or visibility
    /// fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotExportable` for a document that is not
    /// accepted and public, and `UserNotFound` if an author id cannot be
    /// resolved to a display name.
    pub fn export_documents(&self, ids: &[u64], destination: &Path) -> RepoResult<()> {
        let manager = self.documents()?;
        let users = self.users()?;
        fs::create_dir_all(destination)?;

        for &id in ids {
            let document = manager.load_with(id, Some(&users))?;
            if document.state() != crate::document::DocumentState::Accepted
                || !document.is_public()
            {
                return Err(RepositoryError::NotExportable {
                    id,
                    state: document.state().as_str(),
                    is_public: document.is_public(),
                });
            }

            let source_dir = manager.document_dir(id);
            for file in document.files() {
                fs::copy(source_dir.join(file), destination.join(file))?;
            }
            self.write_export_record(&users, id, &document, destination)?;
        }
        Ok(())
    }

    fn write_export_record(
        &self,
        users: &UserManager,
        id: u64,
        document: &Document,
        destination: &Path,
    ) -> RepoResult<()> {
        let mut names = Vec::with_capacity(document.authors().len());
        for &author in document.authors() {
            names.push(users.find_by_id(author)?.full_name());
        }
        let author_value = if names.len() == 1 {
            names.remove(0)
        } else {
            format_list(&names)
        };

        let record = IniSection::from([
            ("title".to_owned(), document.title().to_owned()),
            ("description".to_owned(), document.description().to_owned()),
            ("author".to_owned(), author_value),
            ("files".to_owned(), format_list(document.files())),
            ("doc_format".to_owned(), document.doc_format().to_owned()),
            (
                "creation_date".to_owned(),
                format_timestamp(&document.creation_date()),
            ),
            (
                "modification_date".to_owned(),
                format_timestamp(&document.modification_date()),
            ),
        ]);
        let data = IniData::from([("document".to_owned(), record)]);
        write_ini_file(&destination.join(format!("{id}.{METADATA_EXT}")), &data)?;
        Ok(())
    }

    /// Creates a zip backup of the repository and returns the archive path.
    ///
    /// The archive name is `<name>.zip`, or `<name>_1.zip`, `<name>_2.zip`,
    /// ... when earlier backups already took the name. When the selection
    /// excludes a subdirectory, the tree is first cloned to a scratch
    /// location and the excluded subdirectories emptied there, so the live
    /// repository is never touched. The scratch clone is removed whether or
    /// not archiving succeeds. A successful backup refreshes the recorded
    /// last-backup date.
    pub fn create_backup(
        &self,
        name: &str,
        destination: &Path,
        selection: &BackupSelection,
    ) -> RepoResult<PathBuf> {
        fs::create_dir_all(destination)?;
        let archive = unique_archive_path(destination, name);
        let excluded = selection.excluded();

        if excluded.is_empty() {
            archive_dir(&self.location, &archive)?;
        } else {
            let scratch = destination.join(format!(".{name}_scratch"));
            let result = self.archive_pruned(&scratch, &archive, &excluded);
            let _ = fs::remove_dir_all(&scratch);
            result?;
        }

        self.write_metadata(self.creation_date, now_micros())?;
        info!(archive = %archive.display(), "created backup");
        Ok(archive)
    }

    fn archive_pruned(
        &self,
        scratch: &Path,
        archive: &Path,
        excluded: &[&str],
    ) -> RepoResult<()> {
        copy_dir_recursive(&self.location, scratch)?;
        for dir in excluded {
            empty_dir(&scratch.join(dir))?;
        }
        archive_dir(scratch, archive)
    }

    /// Restores the repository from a backup archive.
    ///
    /// The live tree is deleted first and the archive extracted in its
    /// place; subdirectories the selection excludes are emptied after
    /// extraction. Returns the logical names of the subdirectories that
    /// were not restored. Destructive: once the live tree is gone there is
    /// no rollback if extraction fails.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ArchiveNotFound` if the named archive does
    /// not exist in `source`.
    pub fn restore(
        &self,
        name: &str,
        source: &Path,
        selection: &BackupSelection,
    ) -> RepoResult<Vec<&'static str>> {
        let file_name = if name.ends_with(".zip") {
            name.to_owned()
        } else {
            format!("{name}.zip")
        };
        let archive = source.join(&file_name);
        if !archive.exists() {
            return Err(RepositoryError::ArchiveNotFound(
                file_name,
                source.to_path_buf(),
            ));
        }

        if self.location.exists() {
            fs::remove_dir_all(&self.location)?;
        }
        fs::create_dir_all(&self.location)?;
        extract_archive(&archive, &self.location)?;

        let excluded = selection.excluded();
        for dir in &excluded {
            let path = self.dir(dir);
            if path.exists() {
                empty_dir(&path)?;
            } else {
                fs::create_dir(path)?;
            }
        }
        info!(archive = %archive.display(), "restored repository");
        Ok(excluded)
    }

    /// Whether more than the backup frequency's worth of whole days passed
    /// since the last backup.
    pub fn is_backup_needed(&self) -> RepoResult<bool> {
        let last = self.last_backup_date()?;
        let elapsed = Utc::now().naive_utc() - last;
        Ok(elapsed.num_days() > BACKUP_FREQUENCY_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentState;
    use crate::user::User;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> Repository {
        let config = RepositoryConfig::new("testing", temp.path().join("repo"));
        Repository::open(config).unwrap()
    }

    fn add_user(repository: &Repository) -> u64 {
        let users = repository.users().unwrap();
        let birth = NaiveDate::from_ymd_opt(1990, 4, 12).unwrap();
        users
            .add(&User::new("Amelia", "Harper", birth, "amelia@example.org", "pw").unwrap())
            .unwrap()
    }

    fn add_document(repository: &Repository, temp: &TempDir, author: u64) -> u64 {
        let staged = temp.path().join("staged.txt");
        fs::write(&staged, "payload").unwrap();
        let document = Document::new(
            "Field notes",
            "Observations",
            vec![author],
            vec![staged.to_string_lossy().into_owned()],
            "txt",
        );
        repository.documents().unwrap().add(&document).unwrap()
    }

    #[test]
    fn test_open_initializes_layout_once() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        for dir in REPOSITORY_DIRS {
            assert!(repository.location().join(dir).is_dir(), "{dir}");
        }
        assert!(repository.location().join("paths.edr").is_file());
        assert!(repository.location().join("repo_metadata.edr").is_file());
        assert!(repository.location().join("users/roles.txt").is_file());

        // A second open loads instead of reinitialising.
        let reopened = open(&temp);
        assert_eq!(reopened.creation_date(), repository.creation_date());
    }

    #[test]
    fn test_open_rejects_a_file_at_the_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        fs::write(&root, "not a directory").unwrap();
        let result = Repository::open(RepositoryConfig::new("testing", root));
        assert!(matches!(result, Err(RepositoryError::NotADirectory(_))));
    }

    #[test]
    fn test_fresh_repository_was_never_backed_up() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        assert_eq!(repository.last_backup_date().unwrap(), epoch());
        assert!(repository.is_backup_needed().unwrap());
    }

    #[test]
    fn test_import_copies_and_keeps_ids() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let staging = temp.path().join("staging");
        let manager = repository.documents().unwrap();
        copy_dir_recursive(&manager.document_dir(id), &staging.join("41")).unwrap();
        // The copied record keeps its own file name; rename to match id 41.
        fs::rename(
            staging.join("41").join(crate::constants::document_metadata_file_name(id)),
            staging.join("41").join(crate::constants::document_metadata_file_name(41)),
        )
        .unwrap();

        let imported = repository.import_documents(&staging).unwrap();
        assert_eq!(imported, vec![41]);
        assert_eq!(manager.load(41).unwrap().title(), "Field notes");
    }

    #[test]
    fn test_import_rejects_empty_source() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let staging = temp.path().join("staging");
        fs::create_dir(&staging).unwrap();
        assert!(matches!(
            repository.import_documents(&staging),
            Err(RepositoryError::EmptySource(_))
        ));
        assert!(matches!(
            repository.import_documents(&temp.path().join("absent")),
            Err(RepositoryError::MissingPath(_))
        ));
    }

    #[test]
    fn test_import_collision_fails_but_keeps_prior_imports() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let staging = temp.path().join("staging");
        let manager = repository.documents().unwrap();
        copy_dir_recursive(&manager.document_dir(id), &staging.join(id.to_string())).unwrap();

        assert!(matches!(
            repository.import_documents(&staging),
            Err(RepositoryError::ImportIdCollision(_))
        ));
    }

    #[test]
    fn test_import_removes_an_invalid_copy() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);

        let staging = temp.path().join("staging/7");
        fs::create_dir_all(&staging).unwrap();
        // A record referencing a payload file that is not there.
        fs::write(
            staging.join(crate::constants::document_metadata_file_name(7)),
            "[document]\ntitle=T\ndescription=D\nauthor=1\nfiles=['gone.txt']\n\
             doc_format=txt\ncreation_date=2016/1/2 3:4:5 0\n\
             modification_date=2016/1/2 3:4:5 0\nstate=new\nis_public=false\n",
        )
        .unwrap();

        let result = repository.import_documents(staging.parent().unwrap());
        assert!(matches!(
            result,
            Err(RepositoryError::MissingDocumentFile { id: 7, .. })
        ));
        assert!(!repository.documents().unwrap().document_dir(7).exists());
    }

    #[test]
    fn test_import_copy_failure_leaves_no_debris() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);

        let staging = temp.path().join("staging");
        fs::create_dir(&staging).unwrap();
        // An integer-named plain file makes the recursive copy itself fail.
        fs::write(staging.join("5"), "not a directory").unwrap();

        assert!(repository.import_documents(&staging).is_err());
        let manager = repository.documents().unwrap();
        assert!(!manager.document_dir(5).exists());

        // With the source repaired, the id is free again.
        let author = add_user(&repository);
        fs::remove_file(staging.join("5")).unwrap();
        let id = add_document(&repository, &temp, author);
        copy_dir_recursive(&manager.document_dir(id), &staging.join("5")).unwrap();
        fs::rename(
            staging.join("5").join(crate::constants::document_metadata_file_name(id)),
            staging.join("5").join(crate::constants::document_metadata_file_name(5)),
        )
        .unwrap();
        assert_eq!(repository.import_documents(&staging).unwrap(), vec![5]);
    }

    #[test]
    fn test_export_requires_accepted_and_public() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let destination = temp.path().join("out");
        let result = repository.export_documents(&[id], &destination);
        assert!(matches!(
            result,
            Err(RepositoryError::NotExportable { .. })
        ));
        // Nothing was written for the rejected document.
        assert!(!destination.join("staged.txt").exists());
    }

    #[test]
    fn test_export_writes_files_and_public_record() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let manager = repository.documents().unwrap();
        let mut document = manager.load(id).unwrap();
        document.change_state(DocumentState::Pending).unwrap();
        document.change_state(DocumentState::Accepted).unwrap();
        document.make_public();
        manager.update(id, &document).unwrap();

        let destination = temp.path().join("out");
        repository.export_documents(&[id], &destination).unwrap();

        assert_eq!(
            fs::read_to_string(destination.join("staged.txt")).unwrap(),
            "payload"
        );
        let record = fs::read_to_string(destination.join(format!("{id}.edr"))).unwrap();
        assert!(record.contains("author=Amelia Harper"));
        assert!(record.contains("title=Field notes"));
        assert!(!record.contains("state="));
        assert!(!record.contains("is_public="));
    }

    #[test]
    fn test_backup_and_restore_round_trip() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let backups = temp.path().join("backups");
        let archive = repository
            .create_backup("weekly", &backups, &BackupSelection::all())
            .unwrap();
        assert_eq!(archive, backups.join("weekly.zip"));
        assert!(!repository.is_backup_needed().unwrap());

        // A second backup with the same name probes the next suffix.
        let second = repository
            .create_backup("weekly", &backups, &BackupSelection::all())
            .unwrap();
        assert_eq!(second, backups.join("weekly_1.zip"));

        // Wreck the live tree and bring it back.
        repository.documents().unwrap().remove(id).unwrap();
        let skipped = repository
            .restore("weekly", &backups, &BackupSelection::all())
            .unwrap();
        assert!(skipped.is_empty());
        assert_eq!(
            repository.documents().unwrap().load(id).unwrap().title(),
            "Field notes"
        );
    }

    #[test]
    fn test_selective_backup_leaves_live_tree_intact() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        let id = add_document(&repository, &temp, author);

        let backups = temp.path().join("backups");
        let selection = BackupSelection {
            documents: false,
            ..BackupSelection::all()
        };
        repository
            .create_backup("partial", &backups, &selection)
            .unwrap();

        // The live documents survive; the scratch clone is gone.
        assert!(repository.documents().unwrap().document_dir(id).exists());
        assert!(!backups.join(".partial_scratch").exists());

        // Restoring the partial backup yields an empty documents dir.
        repository
            .restore("partial", &backups, &BackupSelection::all())
            .unwrap();
        assert_eq!(repository.documents().unwrap().count().unwrap(), 0);
        assert_eq!(repository.users().unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_selective_restore_reports_skipped_dirs() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let author = add_user(&repository);
        add_document(&repository, &temp, author);

        let backups = temp.path().join("backups");
        repository
            .create_backup("full", &backups, &BackupSelection::all())
            .unwrap();

        let selection = BackupSelection {
            documents: false,
            ..BackupSelection::all()
        };
        let skipped = repository.restore("full", &backups, &selection).unwrap();
        assert_eq!(skipped, vec!["documents"]);
        assert_eq!(repository.documents().unwrap().count().unwrap(), 0);
    }

    #[test]
    fn test_restore_missing_archive() {
        let temp = TempDir::new().unwrap();
        let repository = open(&temp);
        let result = repository.restore("absent", temp.path(), &BackupSelection::all());
        assert!(matches!(
            result,
            Err(RepositoryError::ArchiveNotFound(_, _))
        ));
        // The live tree is only deleted once the archive is known to exist.
        assert!(repository.location().join("paths.edr").is_file());
    }
}
