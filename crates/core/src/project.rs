//! Projects and the project manager.
//!
//! A project groups member users and documents under a name. Each project is
//! a directory named by its identifier holding a single metadata record
//! `<id>_project_metadata.edr`.

use crate::constants::project_metadata_file_name;
use crate::roles::Role;
use crate::storage::{existing_ids, next_id};
use crate::user::UserManager;
use crate::{RepoResult, RepositoryError};
use edr_inifmt::{format_list, parse_list, read_ini_file, write_ini_file, IniData, IniSection};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A project of the repository.
///
/// The name is fixed at construction. Members and documents are edited only
/// through the add/remove methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    description: String,
    members: Vec<u64>,
    documents: Vec<u64>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        members: Vec<u64>,
        documents: Vec<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            members,
            documents,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn members(&self) -> &[u64] {
        &self.members
    }

    pub fn documents(&self) -> &[u64] {
        &self.documents
    }

    pub fn add_member(&mut self, user_id: u64) {
        self.members.push(user_id);
    }

    /// Removes one occurrence of the member. Absent members are a no-op.
    pub fn remove_member(&mut self, user_id: u64) {
        if let Some(position) = self.members.iter().position(|member| *member == user_id) {
            self.members.remove(position);
        }
    }

    pub fn add_document(&mut self, document_id: u64) {
        self.documents.push(document_id);
    }

    /// Removes one occurrence of the document. Absent documents are a no-op.
    pub fn remove_document(&mut self, document_id: u64) {
        if let Some(position) = self
            .documents
            .iter()
            .position(|document| *document == document_id)
        {
            self.documents.remove(position);
        }
    }

    /// Whether the members include at least one admin and at least one
    /// manager.
    pub fn has_required_roles(&self, users: &UserManager) -> RepoResult<bool> {
        let by_role = users.users_by_role()?;
        let empty = Vec::new();
        let admins: BTreeSet<&u64> = by_role.get(&Role::Admin).unwrap_or(&empty).iter().collect();
        let managers: BTreeSet<&u64> =
            by_role.get(&Role::Manager).unwrap_or(&empty).iter().collect();

        let has_admin = self.members.iter().any(|member| admins.contains(member));
        let has_manager = self.members.iter().any(|member| managers.contains(member));
        Ok(has_admin && has_manager)
    }
}

/// Manages the projects of one repository projects directory.
#[derive(Debug)]
pub struct ProjectManager {
    location: PathBuf,
}

impl ProjectManager {
    /// Creates a manager bound to the projects directory, creating the
    /// directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotADirectory` if the location exists but is
    /// not a directory.
    pub fn new(location: impl Into<PathBuf>) -> RepoResult<Self> {
        let location = location.into();
        if location.exists() {
            if !location.is_dir() {
                return Err(RepositoryError::NotADirectory(location));
            }
        } else {
            fs::create_dir_all(&location)?;
        }
        Ok(Self { location })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn project_dir(&self, id: u64) -> PathBuf {
        self.location.join(id.to_string())
    }

    /// Persists a new project and returns its allocated identifier.
    pub fn add(&self, project: &Project) -> RepoResult<u64> {
        let id = next_id(&self.location)?;
        self.save(id, project)?;
        Ok(id)
    }

    /// Rewrites an existing project record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ProjectNotFound` if `id` is absent.
    pub fn update(&self, id: u64, project: &Project) -> RepoResult<()> {
        if !self.project_dir(id).exists() {
            return Err(RepositoryError::ProjectNotFound(id));
        }
        self.save(id, project)
    }

    /// Deletes the project's directory.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ProjectNotFound` if `id` is absent.
    pub fn remove(&self, id: u64) -> RepoResult<()> {
        let dir = self.project_dir(id);
        if !dir.exists() {
            return Err(RepositoryError::ProjectNotFound(id));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    /// Loads one project by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ProjectNotFound` if `id` is absent, or a
    /// Format-kind error for a malformed record.
    pub fn find_by_id(&self, id: u64) -> RepoResult<Project> {
        let dir = self.project_dir(id);
        if !dir.exists() {
            return Err(RepositoryError::ProjectNotFound(id));
        }

        let data = read_ini_file(&dir.join(project_metadata_file_name(id)))?;
        let record = data.get("project").ok_or_else(|| {
            RepositoryError::MalformedRecord(format!("project {id} record has no [project] section"))
        })?;
        let field = |name: &str| -> RepoResult<&String> {
            record.get(name).ok_or_else(|| {
                RepositoryError::MalformedRecord(format!("project {id} record is missing {name:?}"))
            })
        };
        let id_list = |name: &str| -> RepoResult<Vec<u64>> {
            let raw = field(name)?;
            parse_list(raw)
                .and_then(|elements| {
                    elements
                        .iter()
                        .map(|element| element.parse().ok())
                        .collect::<Option<Vec<u64>>>()
                })
                .ok_or_else(|| {
                    RepositoryError::MalformedRecord(format!(
                        "project {id} has a non-list {name} field"
                    ))
                })
        };

        Ok(Project::new(
            field("name")?.clone(),
            field("description")?.clone(),
            id_list("members")?,
            id_list("documents")?,
        ))
    }

    /// Finds projects whose name contains `name` case-insensitively.
    pub fn find_by_name(&self, name: &str) -> RepoResult<Vec<(u64, Project)>> {
        let needle = name.to_lowercase();
        let mut found = Vec::new();
        for id in self.list_ids()? {
            let project = self.find_by_id(id)?;
            if project.name.to_lowercase().contains(&needle) {
                found.push((id, project));
            }
        }
        Ok(found)
    }

    pub fn list_ids(&self) -> RepoResult<Vec<u64>> {
        let mut ids = existing_ids(&self.location)?;
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.list_ids()?.len())
    }

    fn save(&self, id: u64, project: &Project) -> RepoResult<()> {
        let dir = self.project_dir(id);
        fs::create_dir_all(&dir)?;
        let record = IniSection::from([
            ("name".to_owned(), project.name.clone()),
            ("description".to_owned(), project.description.clone()),
            ("members".to_owned(), format_list(&project.members)),
            ("documents".to_owned(), format_list(&project.documents)),
        ]);
        let data = IniData::from([("project".to_owned(), record)]);
        write_ini_file(&dir.join(project_metadata_file_name(id)), &data)?;
        Ok(())
    }
}
