//! Repository configuration.

use crate::roles::RolesEncoding;
use std::path::PathBuf;

/// Settings resolved once when a [`crate::Repository`] is opened.
///
/// The roles encoding only matters when the repository is initialised; an
/// existing repository keeps whatever roles file it already has.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub name: String,
    pub location: PathBuf,
    pub roles_encoding: RolesEncoding,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            roles_encoding: RolesEncoding::Txt,
        }
    }

    pub fn with_roles_encoding(mut self, encoding: RolesEncoding) -> Self {
        self.roles_encoding = encoding;
        self
    }
}
