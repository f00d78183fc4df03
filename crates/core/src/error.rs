use std::path::PathBuf;

/// Broad classification of a [`RepositoryError`].
///
/// Callers that only care about the class of a failure (lookup miss versus
/// malformed file versus workflow violation) can branch on this instead of
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A requested identifier is absent from its collection.
    NotFound,
    /// A domain value was rejected at construction or mutation time.
    Validation,
    /// Persisted text could not be understood.
    Format,
    /// A cross-entity consistency rule was violated.
    Integrity,
    /// A workflow-ordering or export precondition was violated.
    Precondition,
    /// A required path was missing or of the wrong type.
    Resource,
    /// An underlying I/O operation failed.
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    // Lookup misses
    #[error("no document with id {0} exists in the repository")]
    DocumentNotFound(u64),
    #[error("no user with id {0} exists in the repository")]
    UserNotFound(u64),
    #[error("no project with id {0} exists in the repository")]
    ProjectNotFound(u64),
    #[error("no document matched the query: {0}")]
    NoMatchingDocuments(String),
    #[error("user {0} has no recorded roles")]
    NoRolesForUser(u64),

    // Domain validation
    #[error("{0:?} is not a valid name (alphanumeric, non-empty)")]
    InvalidName(String),
    #[error("{0:?} is not a valid email address")]
    InvalidEmail(String),
    #[error("the password must not be empty")]
    InvalidPassword,
    #[error("{0:?} is not a valid role")]
    InvalidRole(String),
    #[error("{0:?} is not a valid document state")]
    InvalidState(String),
    #[error("cannot change document state from {from} to {to}; legal next states: {allowed}")]
    IllegalStateTransition {
        from: &'static str,
        to: &'static str,
        allowed: &'static str,
    },

    // Malformed persisted text
    #[error(transparent)]
    Ini(#[from] edr_inifmt::IniError),
    #[error("roles file {0:?} has an unsupported extension (expected txt, json or xml)")]
    WrongRolesFileType(String),
    #[error("multiple roles files exist in {0}")]
    MultipleRolesFiles(PathBuf),
    #[error("no roles file exists in {0}")]
    RolesFileMissing(PathBuf),
    #[error("roles file line {0} has no user identifier")]
    MissingUserIdentifier(usize),
    #[error("roles file line {0} has a missing or repeated ':' delimiter")]
    MissingDelimiter(usize),
    #[error("user id {0:?} appears more than once in the roles file")]
    DuplicateUserIdentifier(String),
    #[error("role {0:?} is listed more than once for the same user")]
    DuplicateRole(String),
    #[error("roles file structure is invalid: {0}")]
    InvalidRolesStructure(String),
    #[error("record is malformed: {0}")]
    MalformedRecord(String),

    // Cross-entity consistency
    #[error("document {id} references file {file:?} which is missing on disk")]
    MissingDocumentFile { id: u64, file: String },
    #[error("document {0} has no authors")]
    NoAuthors(u64),
    #[error("document {0} has no registered files")]
    NoRegisteredFiles(u64),
    #[error("document id {0} already exists in the target collection")]
    ImportIdCollision(u64),
    #[error("document {0} stores authors by name but no resolver was supplied")]
    AuthorResolutionUnavailable(u64),

    // Workflow preconditions
    #[error("review ordering violated: {0}")]
    ReviewPrecondition(&'static str),
    #[error("document {id} is not exportable (state {state}, public: {is_public})")]
    NotExportable {
        id: u64,
        state: &'static str,
        is_public: bool,
    },

    // Missing or mistyped paths
    #[error("path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("source directory {0} contains no importable documents")]
    EmptySource(PathBuf),
    #[error("no backup archive named {0:?} exists in {1}")]
    ArchiveNotFound(String, PathBuf),

    #[error("archive error: {0}")]
    Archive(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepositoryError {
    /// Returns the broad classification of this error.
    pub fn kind(&self) -> ErrorKind {
        use RepositoryError::*;
        match self {
            DocumentNotFound(_) | UserNotFound(_) | ProjectNotFound(_)
            | NoMatchingDocuments(_) | NoRolesForUser(_) => ErrorKind::NotFound,
            InvalidName(_) | InvalidEmail(_) | InvalidPassword | InvalidRole(_)
            | InvalidState(_) | IllegalStateTransition { .. } => ErrorKind::Validation,
            Ini(_) | WrongRolesFileType(_) | MultipleRolesFiles(_) | RolesFileMissing(_)
            | MissingUserIdentifier(_) | MissingDelimiter(_) | DuplicateUserIdentifier(_)
            | DuplicateRole(_) | InvalidRolesStructure(_) | MalformedRecord(_) => {
                ErrorKind::Format
            }
            MissingDocumentFile { .. } | NoAuthors(_) | NoRegisteredFiles(_)
            | ImportIdCollision(_) | AuthorResolutionUnavailable(_) => ErrorKind::Integrity,
            ReviewPrecondition(_) | NotExportable { .. } => ErrorKind::Precondition,
            MissingPath(_) | NotADirectory(_) | EmptySource(_) | ArchiveNotFound(..) => {
                ErrorKind::Resource
            }
            Archive(_) | Io(_) => ErrorKind::Io,
        }
    }
}

pub type RepoResult<T> = std::result::Result<T, RepositoryError>;
