//! Constants used throughout the EDR core crate.
//!
//! This module contains the canonical directory names, file name patterns and
//! policy constants so they stay consistent across the codebase.

/// Directory name for document storage.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

/// Directory name for user files and the roles file.
pub const USERS_DIR_NAME: &str = "users";

/// Directory name for project storage.
pub const PROJECTS_DIR_NAME: &str = "projects";

/// Directory name for generated reports.
pub const REPORTS_DIR_NAME: &str = "reports";

/// Directory name for repository event logs.
pub const LOGS_DIR_NAME: &str = "logs";

/// The five logical subdirectories of a repository, in layout order.
pub const REPOSITORY_DIRS: &[&str] = &[
    DOCUMENTS_DIR_NAME,
    LOGS_DIR_NAME,
    PROJECTS_DIR_NAME,
    REPORTS_DIR_NAME,
    USERS_DIR_NAME,
];

/// Extension shared by every EDR metadata file.
pub const METADATA_EXT: &str = "edr";

/// File name of the path-mapping record, relative to the repository root.
pub const PATHS_FILE_NAME: &str = "paths.edr";

/// Stem of the roles file; the extension selects the encoding.
pub const ROLES_FILE_STEM: &str = "roles";

/// Days after which [`crate::Repository::is_backup_needed`] reports true.
pub const BACKUP_FREQUENCY_DAYS: i64 = 7;

/// Returns the metadata file name for a document id.
pub fn document_metadata_file_name(id: u64) -> String {
    format!("{id}_document_metadata.{METADATA_EXT}")
}

/// Returns the metadata file name for a project id.
pub fn project_metadata_file_name(id: u64) -> String {
    format!("{id}_project_metadata.{METADATA_EXT}")
}
