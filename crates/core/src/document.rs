//! Documents and the document manager.
//!
//! A document is stored as a directory named by its identifier, containing
//! the document's payload files by base name plus a metadata record
//! `<id>_document_metadata.edr`. The manager owns every operation on the
//! collection: add, load, update, remove, queries and the file integrity
//! checks.

use crate::constants::document_metadata_file_name;
use crate::storage::{existing_ids, move_file_into, next_id};
use crate::timestamp::{format_timestamp, now_micros, parse_timestamp};
use crate::{RepoResult, RepositoryError};
use chrono::NaiveDateTime;
use edr_inifmt::{format_list, parse_list, read_ini_file, write_ini_file, IniData, IniSection};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Lifecycle state of a document.
///
/// The only legal transitions are new -> pending, pending -> accepted and
/// pending -> rejected; accepted and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    New,
    Pending,
    Accepted,
    Rejected,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::New => "new",
            DocumentState::Pending => "pending",
            DocumentState::Accepted => "accepted",
            DocumentState::Rejected => "rejected",
        }
    }

    /// The states reachable from this one, rendered for error messages.
    fn allowed_next(&self) -> &'static str {
        match self {
            DocumentState::New => "pending",
            DocumentState::Pending => "accepted, rejected",
            DocumentState::Accepted | DocumentState::Rejected => "none (terminal state)",
        }
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentState {
    type Err = RepositoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "new" => Ok(DocumentState::New),
            "pending" => Ok(DocumentState::Pending),
            "accepted" => Ok(DocumentState::Accepted),
            "rejected" => Ok(DocumentState::Rejected),
            other => Err(RepositoryError::InvalidState(other.to_owned())),
        }
    }
}

/// Resolves legacy author display names to user identifiers.
///
/// Old document records stored authors as display names instead of ids; the
/// manager needs a collaborator (in practice the user manager) to map those
/// names back. Injected per call so the document manager holds no reference
/// to other managers.
pub trait AuthorResolver {
    /// Returns the ids of every user whose full name matches `name`.
    fn resolve_author_name(&self, name: &str) -> RepoResult<Vec<u64>>;
}

/// A document of the repository.
///
/// Carries title, description, author ids, payload file names, a short
/// format tag, the two timestamps, the lifecycle state and the visibility
/// flag. New documents start in state `new` and private.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    title: String,
    description: String,
    authors: Vec<u64>,
    files: Vec<String>,
    doc_format: String,
    creation_date: NaiveDateTime,
    modification_date: NaiveDateTime,
    state: DocumentState,
    is_public: bool,
}

impl Document {
    /// Creates a new in-memory document.
    ///
    /// `files` may reference staging paths outside the repository; they are
    /// moved into the document's directory and reduced to base names when
    /// the document is persisted.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        authors: Vec<u64>,
        files: Vec<String>,
        doc_format: impl Into<String>,
    ) -> Self {
        let now = now_micros();
        Self {
            title: title.into(),
            description: description.into(),
            authors,
            files,
            doc_format: doc_format.into(),
            creation_date: now,
            modification_date: now,
            state: DocumentState::New,
            is_public: false,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn authors(&self) -> &[u64] {
        &self.authors
    }

    pub fn set_authors(&mut self, authors: Vec<u64>) {
        self.authors = authors;
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn set_files(&mut self, files: Vec<String>) {
        self.files = files;
    }

    pub fn doc_format(&self) -> &str {
        &self.doc_format
    }

    pub fn creation_date(&self) -> NaiveDateTime {
        self.creation_date
    }

    pub fn set_creation_date(&mut self, ts: NaiveDateTime) {
        self.creation_date = ts;
    }

    pub fn modification_date(&self) -> NaiveDateTime {
        self.modification_date
    }

    pub fn set_modification_date(&mut self, ts: NaiveDateTime) {
        self.modification_date = ts;
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn make_public(&mut self) {
        self.is_public = true;
    }

    pub fn make_private(&mut self) {
        self.is_public = false;
    }

    /// Advances the lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::IllegalStateTransition` naming the legal
    /// next states when the requested edge is not one of new -> pending,
    /// pending -> accepted, pending -> rejected.
    pub fn change_state(&mut self, new_state: DocumentState) -> RepoResult<()> {
        let legal = matches!(
            (self.state, new_state),
            (DocumentState::New, DocumentState::Pending)
                | (DocumentState::Pending, DocumentState::Accepted)
                | (DocumentState::Pending, DocumentState::Rejected)
        );
        if !legal {
            return Err(RepositoryError::IllegalStateTransition {
                from: self.state.as_str(),
                to: new_state.as_str(),
                allowed: self.state.allowed_next(),
            });
        }
        self.state = new_state;
        Ok(())
    }
}

/// How the author field was encoded in a persisted record.
enum AuthorField {
    /// A bare integer: a single author id.
    Single(u64),
    /// A bracketed list of ids.
    Ids(Vec<u64>),
    /// A legacy bracketed list of display names, needing resolution.
    Names(Vec<String>),
}

impl AuthorField {
    fn decode(value: &str) -> AuthorField {
        if let Some(elements) = parse_list(value) {
            let ids: Option<Vec<u64>> =
                elements.iter().map(|element| element.parse().ok()).collect();
            match ids {
                Some(ids) => AuthorField::Ids(ids),
                None => AuthorField::Names(elements),
            }
        } else if let Ok(id) = value.parse() {
            AuthorField::Single(id)
        } else {
            AuthorField::Names(vec![value.to_owned()])
        }
    }
}

/// Manages the documents of one repository collection directory.
#[derive(Debug)]
pub struct DocumentManager {
    location: PathBuf,
}

impl DocumentManager {
    /// Creates a manager bound to an existing collection directory.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingPath` / `NotADirectory` if the
    /// location is absent or not a directory.
    pub fn new(location: impl Into<PathBuf>) -> RepoResult<Self> {
        let location = location.into();
        if !location.exists() {
            return Err(RepositoryError::MissingPath(location));
        }
        if !location.is_dir() {
            return Err(RepositoryError::NotADirectory(location));
        }
        Ok(Self { location })
    }

    /// The collection directory this manager is bound to.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the directory holding one document.
    pub fn document_dir(&self, id: u64) -> PathBuf {
        self.location.join(id.to_string())
    }

    fn metadata_path(&self, id: u64) -> PathBuf {
        self.document_dir(id).join(document_metadata_file_name(id))
    }

    /// Persists a new document and returns its allocated identifier.
    ///
    /// Allocates the next id, creates `documents/<id>/`, moves every staged
    /// file into it and writes the metadata record with file base names.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoAuthors` for a document with an empty
    /// author list, `MissingPath` for a staged file that does not exist, or
    /// an I/O error.
    pub fn add(&self, document: &Document) -> RepoResult<u64> {
        let id = next_id(&self.location)?;
        let dir = self.document_dir(id);
        fs::create_dir_all(&dir)?;
        if let Err(error) = self.save(&dir, id, document) {
            // Do not leave a half-written document directory behind.
            let _ = fs::remove_dir_all(&dir);
            return Err(error);
        }
        Ok(id)
    }

    /// Rewrites an existing document record in place, re-homing new files.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DocumentNotFound` if `id` is absent.
    pub fn update(&self, id: u64, document: &Document) -> RepoResult<()> {
        if !self.list_ids()?.contains(&id) {
            return Err(RepositoryError::DocumentNotFound(id));
        }
        self.save(&self.document_dir(id), id, document)
    }

    /// Deletes the document's whole storage subtree.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DocumentNotFound` if `id` is absent.
    pub fn remove(&self, id: u64) -> RepoResult<()> {
        let dir = self.document_dir(id);
        if !dir.exists() {
            return Err(RepositoryError::DocumentNotFound(id));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    /// Loads a document without legacy author-name resolution.
    pub fn load(&self, id: u64) -> RepoResult<Document> {
        self.load_with(id, None)
    }

    /// Loads a document, resolving legacy author names through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DocumentNotFound` if the document directory
    /// is absent, `AuthorResolutionUnavailable` if the record stores names
    /// but no resolver was supplied, or a Format-kind error for a malformed
    /// record.
    pub fn load_with(
        &self,
        id: u64,
        resolver: Option<&dyn AuthorResolver>,
    ) -> RepoResult<Document> {
        if !self.document_dir(id).exists() {
            return Err(RepositoryError::DocumentNotFound(id));
        }

        let data = read_ini_file(&self.metadata_path(id))?;
        let record = data.get("document").ok_or_else(|| {
            RepositoryError::MalformedRecord(format!("document {id} record has no [document] section"))
        })?;
        let field = |name: &str| -> RepoResult<&String> {
            record.get(name).ok_or_else(|| {
                RepositoryError::MalformedRecord(format!("document {id} record is missing {name:?}"))
            })
        };

        let authors = match AuthorField::decode(field("author")?) {
            AuthorField::Single(author) => vec![author],
            AuthorField::Ids(ids) => ids,
            AuthorField::Names(names) => {
                let resolver =
                    resolver.ok_or(RepositoryError::AuthorResolutionUnavailable(id))?;
                let mut ids = BTreeSet::new();
                for name in &names {
                    ids.extend(resolver.resolve_author_name(name)?);
                }
                ids.into_iter().collect()
            }
        };

        let files = parse_list(field("files")?).ok_or_else(|| {
            RepositoryError::MalformedRecord(format!("document {id} has a non-list files field"))
        })?;

        let mut document = Document::new(
            field("title")?.clone(),
            field("description")?.clone(),
            authors,
            files,
            field("doc_format")?.clone(),
        );
        document.creation_date = parse_timestamp(field("creation_date")?)?;
        document.modification_date = parse_timestamp(field("modification_date")?)?;
        document.state = field("state")?.parse()?;
        document.is_public = field("is_public")?.eq_ignore_ascii_case("true");
        Ok(document)
    }

    /// Every integer-named immediate child of the collection directory.
    pub fn list_ids(&self) -> RepoResult<BTreeSet<u64>> {
        Ok(existing_ids(&self.location)?.into_iter().collect())
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.list_ids()?.len())
    }

    /// Loads every document in the collection, keyed by id.
    pub fn load_all(&self) -> RepoResult<BTreeMap<u64, Document>> {
        self.load_all_with(None)
    }

    pub fn load_all_with(
        &self,
        resolver: Option<&dyn AuthorResolver>,
    ) -> RepoResult<BTreeMap<u64, Document>> {
        let mut documents = BTreeMap::new();
        for id in self.list_ids()? {
            documents.insert(id, self.load_with(id, resolver)?);
        }
        Ok(documents)
    }

    /// Loads one document by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DocumentNotFound` if `id` is absent.
    pub fn find_by_id(&self, id: u64) -> RepoResult<Document> {
        self.load(id)
    }

    /// Finds documents whose title matches `title` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoMatchingDocuments` when nothing matches;
    /// callers for whom zero matches is fine must catch that kind.
    pub fn find_by_title(&self, title: &str) -> RepoResult<Vec<Document>> {
        self.find_matching(&format!("title {title:?}"), |document| {
            document.title.eq_ignore_ascii_case(title)
        })
    }

    /// Finds documents whose author list contains `author`.
    pub fn find_by_author(&self, author: u64) -> RepoResult<Vec<Document>> {
        self.find_matching(&format!("author {author}"), |document| {
            document.authors.contains(&author)
        })
    }

    /// Finds documents with exactly the given format tag.
    pub fn find_by_format(&self, doc_format: &str) -> RepoResult<Vec<Document>> {
        self.find_matching(&format!("format {doc_format:?}"), |document| {
            document.doc_format == doc_format
        })
    }

    fn find_matching(
        &self,
        query: &str,
        predicate: impl Fn(&Document) -> bool,
    ) -> RepoResult<Vec<Document>> {
        let matches: Vec<Document> = self
            .load_all()?
            .into_values()
            .filter(|document| predicate(document))
            .collect();
        if matches.is_empty() {
            return Err(RepositoryError::NoMatchingDocuments(query.to_owned()));
        }
        Ok(matches)
    }

    /// Checks that every registered file of a document exists on disk.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoRegisteredFiles` for a document whose
    /// record lists no files.
    pub fn files_exist(&self, id: u64) -> RepoResult<BTreeMap<String, bool>> {
        let document = self.find_by_id(id)?;
        if document.files.is_empty() {
            return Err(RepositoryError::NoRegisteredFiles(id));
        }

        let dir = self.document_dir(id);
        Ok(document
            .files
            .iter()
            .map(|file| (file.clone(), dir.join(file).is_file()))
            .collect())
    }

    /// Maps every on-disk file of the document to whether the record
    /// references it. The metadata file itself counts as referenced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoRegisteredFiles` if the document
    /// directory holds nothing at all.
    pub fn unreferenced_files(&self, id: u64) -> RepoResult<BTreeMap<String, bool>> {
        let document = self.find_by_id(id)?;
        let metadata_name = document_metadata_file_name(id);

        let mut referenced = BTreeMap::new();
        for entry in fs::read_dir(self.document_dir(id))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_referenced = name == metadata_name || document.files.contains(&name);
            referenced.insert(name, is_referenced);
        }
        if referenced.is_empty() {
            return Err(RepositoryError::NoRegisteredFiles(id));
        }
        Ok(referenced)
    }

    /// Deletes every file in the document directory the record does not
    /// reference.
    pub fn remove_unreferenced_files(&self, id: u64) -> RepoResult<()> {
        let dir = self.document_dir(id);
        for (name, is_referenced) in self.unreferenced_files(id)? {
            if !is_referenced {
                fs::remove_file(dir.join(name))?;
            }
        }
        Ok(())
    }

    /// Writes the metadata record and homes the document's files.
    fn save(&self, dir: &Path, id: u64, document: &Document) -> RepoResult<()> {
        if document.authors.is_empty() {
            return Err(RepositoryError::NoAuthors(id));
        }

        let mut basenames = Vec::with_capacity(document.files.len());
        for file in &document.files {
            let source = Path::new(file);
            let basename = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| RepositoryError::MissingPath(source.to_path_buf()))?;

            if source.exists() && source != dir.join(&basename) {
                move_file_into(source, dir)?;
            } else if !dir.join(&basename).exists() {
                return Err(RepositoryError::MissingPath(source.to_path_buf()));
            }
            basenames.push(basename);
        }

        let author_value = if document.authors.len() == 1 {
            document.authors[0].to_string()
        } else {
            format_list(&document.authors)
        };

        let record = IniSection::from([
            ("title".to_owned(), document.title.clone()),
            ("description".to_owned(), document.description.clone()),
            ("author".to_owned(), author_value),
            ("files".to_owned(), format_list(&basenames)),
            ("doc_format".to_owned(), document.doc_format.clone()),
            (
                "creation_date".to_owned(),
                format_timestamp(&document.creation_date),
            ),
            (
                "modification_date".to_owned(),
                format_timestamp(&document.modification_date),
            ),
            ("state".to_owned(), document.state.as_str().to_owned()),
            ("is_public".to_owned(), document.is_public.to_string()),
        ]);
        let data = IniData::from([("document".to_owned(), record)]);
        write_ini_file(&dir.join(document_metadata_file_name(id)), &data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn stage_file(dir: &Path, name: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, b"payload").unwrap();
        path.to_string_lossy().into_owned()
    }

    fn manager(temp: &TempDir) -> DocumentManager {
        let collection = temp.path().join("documents");
        fs::create_dir(&collection).unwrap();
        DocumentManager::new(collection).unwrap()
    }

    #[test]
    fn test_new_document_starts_new_and_private() {
        let document = Document::new("T", "D", vec![1], vec![], "txt");
        assert_eq!(document.state(), DocumentState::New);
        assert!(!document.is_public());
    }

    #[test]
    fn test_state_machine_allows_only_legal_edges() {
        let all = [
            DocumentState::New,
            DocumentState::Pending,
            DocumentState::Accepted,
            DocumentState::Rejected,
        ];
        for from in all {
            for to in all {
                let mut document = Document::new("T", "D", vec![1], vec![], "txt");
                document.state = from;
                let legal = matches!(
                    (from, to),
                    (DocumentState::New, DocumentState::Pending)
                        | (DocumentState::Pending, DocumentState::Accepted)
                        | (DocumentState::Pending, DocumentState::Rejected)
                );
                let result = document.change_state(to);
                assert_eq!(result.is_ok(), legal, "transition {from} -> {to}");
                if !legal {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
                }
            }
        }
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        for expected in 1..=3u64 {
            let staged = stage_file(temp.path(), &format!("f{expected}.txt"));
            let document = Document::new("T", "D", vec![1], vec![staged], "txt");
            assert_eq!(manager.add(&document).unwrap(), expected);
        }
    }

    #[test]
    fn test_removed_id_is_not_reused() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        for i in 1..=3u64 {
            let staged = stage_file(temp.path(), &format!("f{i}.txt"));
            manager
                .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
                .unwrap();
        }
        manager.remove(2).unwrap();
        let staged = stage_file(temp.path(), "f4.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
            .unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_add_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");

        let mut original = Document::new("Some doc", "About things", vec![3, 5], vec![staged], "txt");
        original.make_public();
        let id = manager.add(&original).unwrap();

        let loaded = manager.load(id).unwrap();
        assert_eq!(loaded.title(), "Some doc");
        assert_eq!(loaded.description(), "About things");
        assert_eq!(loaded.authors(), &[3, 5]);
        // Staged path collapses to its base name.
        assert_eq!(loaded.files(), &["a.txt".to_owned()]);
        assert_eq!(loaded.doc_format(), "txt");
        assert_eq!(loaded.creation_date(), original.creation_date());
        assert_eq!(loaded.modification_date(), original.modification_date());
        assert_eq!(loaded.state(), DocumentState::New);
        assert!(loaded.is_public());
        assert!(!temp.path().join("a.txt").exists());
    }

    #[test]
    fn test_single_author_collapses_to_bare_int() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![7], vec![staged], "txt"))
            .unwrap();

        let metadata = fs::read_to_string(manager.document_dir(id).join(document_metadata_file_name(id)))
            .unwrap();
        assert!(metadata.contains("author=7"));
        assert_eq!(manager.load(id).unwrap().authors(), &[7]);
    }

    #[test]
    fn test_add_rejects_empty_author_list() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let result = manager.add(&Document::new("T", "D", vec![], vec![staged], "txt"));
        assert!(matches!(result, Err(RepositoryError::NoAuthors(_))));
        // The half-created directory must not survive.
        assert!(manager.list_ids().unwrap().is_empty());
    }

    #[test]
    fn test_update_missing_document() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let document = Document::new("T", "D", vec![1], vec![], "txt");
        let result = manager.update(9, &document);
        assert!(matches!(result, Err(RepositoryError::DocumentNotFound(9))));
    }

    #[test]
    fn test_update_rewrites_in_place() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
            .unwrap();

        let mut updated = manager.load(id).unwrap();
        updated.set_description("Revised");
        manager.update(id, &updated).unwrap();

        let loaded = manager.load(id).unwrap();
        assert_eq!(loaded.description(), "Revised");
        assert_eq!(loaded.files(), &["a.txt".to_owned()]);
    }

    #[test]
    fn test_remove_deletes_subtree() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
            .unwrap();

        manager.remove(id).unwrap();
        assert!(!manager.document_dir(id).exists());
        assert!(matches!(
            manager.remove(id),
            Err(RepositoryError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_find_by_title_is_case_insensitive_exact() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        manager
            .add(&Document::new("Annual Report", "D", vec![1], vec![staged], "pdf"))
            .unwrap();

        assert_eq!(manager.find_by_title("annual report").unwrap().len(), 1);
        let missing = manager.find_by_title("Annual");
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_find_by_author_membership() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let first = stage_file(temp.path(), "a.txt");
        let second = stage_file(temp.path(), "b.txt");
        manager
            .add(&Document::new("A", "D", vec![1, 2], vec![first], "pdf"))
            .unwrap();
        manager
            .add(&Document::new("B", "D", vec![2], vec![second], "pdf"))
            .unwrap();

        assert_eq!(manager.find_by_author(2).unwrap().len(), 2);
        assert_eq!(manager.find_by_author(1).unwrap().len(), 1);
        assert!(matches!(
            manager.find_by_author(9),
            Err(RepositoryError::NoMatchingDocuments(_))
        ));
    }

    #[test]
    fn test_find_by_format() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        manager
            .add(&Document::new("A", "D", vec![1], vec![staged], "pdf"))
            .unwrap();

        assert_eq!(manager.find_by_format("pdf").unwrap().len(), 1);
        assert!(manager.find_by_format("doc").is_err());
    }

    #[test]
    fn test_files_exist_flags_missing_files() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
            .unwrap();

        fs::remove_file(manager.document_dir(id).join("a.txt")).unwrap();
        let existence = manager.files_exist(id).unwrap();
        assert_eq!(existence["a.txt"], false);
    }

    #[test]
    fn test_unreferenced_files_and_cleanup() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        let staged = stage_file(temp.path(), "a.txt");
        let id = manager
            .add(&Document::new("T", "D", vec![1], vec![staged], "txt"))
            .unwrap();

        let stray = manager.document_dir(id).join("stray.tmp");
        fs::write(&stray, b"junk").unwrap();

        let referenced = manager.unreferenced_files(id).unwrap();
        assert_eq!(referenced["a.txt"], true);
        assert_eq!(referenced[&document_metadata_file_name(id)], true);
        assert_eq!(referenced["stray.tmp"], false);

        manager.remove_unreferenced_files(id).unwrap();
        assert!(!stray.exists());
        assert!(manager.document_dir(id).join("a.txt").exists());
    }

    struct NameBook(BTreeMap<String, Vec<u64>>);

    impl AuthorResolver for NameBook {
        fn resolve_author_name(&self, name: &str) -> RepoResult<Vec<u64>> {
            Ok(self.0.get(name).cloned().unwrap_or_default())
        }
    }

    fn write_legacy_record(manager: &DocumentManager, id: u64, author_value: &str) {
        let dir = manager.document_dir(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(document_metadata_file_name(id)),
            format!(
                "[document]\ntitle=Legacy\ndescription=Old\nauthor={author_value}\n\
                 files=[]\ndoc_format=txt\ncreation_date=2016/1/2 3:4:5 0\n\
                 modification_date=2016/1/2 3:4:5 0\nstate=new\nis_public=false\n"
            ),
        )
        .unwrap();
    }

    #[test]
    fn test_legacy_author_names_resolve_and_deduplicate() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        write_legacy_record(&manager, 1, "['Alice Smith', 'Bob Marker']");

        let book = NameBook(BTreeMap::from([
            ("Alice Smith".to_owned(), vec![4, 2]),
            ("Bob Marker".to_owned(), vec![2]),
        ]));
        let document = manager.load_with(1, Some(&book)).unwrap();
        assert_eq!(document.authors(), &[2, 4]);
    }

    #[test]
    fn test_legacy_author_names_without_resolver_fail() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp);
        write_legacy_record(&manager, 1, "['Alice Smith']");

        let result = manager.load(1);
        assert!(matches!(
            result,
            Err(RepositoryError::AuthorResolutionUnavailable(1))
        ));
    }
}
