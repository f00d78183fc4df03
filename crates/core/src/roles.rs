//! User roles and the on-disk role store.
//!
//! Roles live in a single file next to the user records, named `roles.txt`,
//! `roles.json` or `roles.xml`. The extension selects the encoding; exactly
//! one roles file may exist. All three encodings carry the same mapping from
//! user id to assigned roles.

use crate::constants::ROLES_FILE_STEM;
use crate::{RepoResult, RepositoryError};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A role a user may hold. The vocabulary is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Author,
    Reviewer,
    Visitor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Author => "author",
            Role::Reviewer => "reviewer",
            Role::Visitor => "visitor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RepositoryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "author" => Ok(Role::Author),
            "reviewer" => Ok(Role::Reviewer),
            "visitor" => Ok(Role::Visitor),
            other => Err(RepositoryError::InvalidRole(other.to_owned())),
        }
    }
}

/// The encoding of the roles file, selected by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolesEncoding {
    Txt,
    Json,
    Xml,
}

impl RolesEncoding {
    pub fn extension(&self) -> &'static str {
        match self {
            RolesEncoding::Txt => "txt",
            RolesEncoding::Json => "json",
            RolesEncoding::Xml => "xml",
        }
    }

    fn from_extension(extension: &str) -> RepoResult<Self> {
        match extension {
            "txt" => Ok(RolesEncoding::Txt),
            "json" => Ok(RolesEncoding::Json),
            "xml" => Ok(RolesEncoding::Xml),
            other => Err(RepositoryError::WrongRolesFileType(other.to_owned())),
        }
    }
}

/// Mapping from user id to assigned roles.
pub type UserRoles = BTreeMap<u64, Vec<Role>>;

/// Reads, merges and validates the roles file of one users directory.
#[derive(Debug)]
pub struct RoleStore {
    location: PathBuf,
}

impl RoleStore {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Creates an empty roles file with the requested encoding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MultipleRolesFiles` if a roles file already
    /// exists.
    pub fn initialize(&self, encoding: RolesEncoding) -> RepoResult<()> {
        if self.roles_file().is_ok() {
            return Err(RepositoryError::MultipleRolesFiles(self.location.clone()));
        }
        let name = format!("{ROLES_FILE_STEM}.{}", encoding.extension());
        fs::write(self.location.join(name), "")?;
        Ok(())
    }

    /// Locates the single roles file in the users directory.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MultipleRolesFiles` if more than one file
    /// named `roles.*` exists, `WrongRolesFileType` for an unsupported
    /// extension, and `RolesFileMissing` if none exists.
    pub fn roles_file(&self) -> RepoResult<PathBuf> {
        let mut found = None;
        for entry in fs::read_dir(&self.location)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.split('.').next() == Some(ROLES_FILE_STEM) {
                if found.is_some() {
                    return Err(RepositoryError::MultipleRolesFiles(self.location.clone()));
                }
                found = Some(entry.path());
            }
        }
        let path = found.ok_or_else(|| RepositoryError::RolesFileMissing(self.location.clone()))?;
        // Reject an unsupported extension up front.
        self.encoding_of(&path)?;
        Ok(path)
    }

    fn encoding_of(&self, path: &Path) -> RepoResult<RolesEncoding> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        RolesEncoding::from_extension(&extension)
    }

    /// Reads the whole role mapping. An empty file yields an empty mapping.
    pub fn read(&self) -> RepoResult<UserRoles> {
        let path = self.roles_file()?;
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(UserRoles::new());
        }
        match self.encoding_of(&path)? {
            RolesEncoding::Txt => parse_txt(&content),
            RolesEncoding::Json => parse_json(&content),
            RolesEncoding::Xml => parse_xml(&content),
        }
    }

    /// Writes role assignments, merging them over the existing mapping.
    ///
    /// Entries in `updates` replace the same user's entry in the file;
    /// other users keep their roles.
    pub fn write(&self, updates: &UserRoles) -> RepoResult<()> {
        let path = self.roles_file()?;
        let mut merged = self.read()?;
        for (user_id, roles) in updates {
            merged.insert(*user_id, roles.clone());
        }
        let content = match self.encoding_of(&path)? {
            RolesEncoding::Txt => render_txt(&merged),
            RolesEncoding::Json => render_json(&merged)?,
            RolesEncoding::Xml => render_xml(&merged)?,
        };
        fs::write(&path, content)?;
        Ok(())
    }

    /// Structurally validates the roles file without building the mapping
    /// for a caller: every record needs an integer user id, every role must
    /// be in the vocabulary, and neither roles per user nor user ids may
    /// repeat.
    pub fn validate(&self) -> RepoResult<()> {
        let path = self.roles_file()?;
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(());
        }
        match self.encoding_of(&path)? {
            RolesEncoding::Txt => validate_txt(&content),
            RolesEncoding::Json => validate_json(&content),
            RolesEncoding::Xml => parse_xml(&content).map(|_| ()),
        }
    }
}

fn parse_txt(content: &str) -> RepoResult<UserRoles> {
    let mut mapping = UserRoles::new();
    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let (id_part, roles_part) = line
            .split_once(':')
            .ok_or(RepositoryError::MissingDelimiter(line_number))?;
        if roles_part.contains(':') {
            return Err(RepositoryError::MissingDelimiter(line_number));
        }
        let id_part = id_part.trim();
        if id_part.is_empty() {
            return Err(RepositoryError::MissingUserIdentifier(line_number));
        }
        let user_id: u64 = id_part
            .parse()
            .map_err(|_| RepositoryError::MissingUserIdentifier(line_number))?;

        let roles_part = roles_part.trim();
        let roles = if roles_part.is_empty() {
            Vec::new()
        } else {
            roles_part
                .split(',')
                .map(|role| role.trim().parse())
                .collect::<RepoResult<Vec<Role>>>()?
        };
        if mapping.insert(user_id, roles).is_some() {
            return Err(RepositoryError::DuplicateUserIdentifier(user_id.to_string()));
        }
    }
    Ok(mapping)
}

fn render_txt(mapping: &UserRoles) -> String {
    let mut out = String::new();
    for (user_id, roles) in mapping {
        let roles_str: Vec<&str> = roles.iter().map(Role::as_str).collect();
        out.push_str(&format!("{}: {}\n", user_id, roles_str.join(",")));
    }
    out
}

fn validate_txt(content: &str) -> RepoResult<()> {
    let mapping = parse_txt(content)?;
    for (user_id, roles) in &mapping {
        let mut seen = BTreeSet::new();
        for role in roles {
            if !seen.insert(role) {
                return Err(RepositoryError::DuplicateRole(format!(
                    "{role} (user {user_id})"
                )));
            }
        }
    }
    Ok(())
}

fn parse_json(content: &str) -> RepoResult<UserRoles> {
    let raw: BTreeMap<String, Vec<Role>> = serde_json::from_str(content)
        .map_err(|error| RepositoryError::InvalidRolesStructure(error.to_string()))?;
    let mut mapping = UserRoles::new();
    for (key, roles) in raw {
        let user_id: u64 = key.parse().map_err(|_| {
            RepositoryError::InvalidRolesStructure(format!("non-integer user id key {key:?}"))
        })?;
        mapping.insert(user_id, roles);
    }
    Ok(mapping)
}

fn render_json(mapping: &UserRoles) -> RepoResult<String> {
    let raw: BTreeMap<String, &Vec<Role>> = mapping
        .iter()
        .map(|(user_id, roles)| (user_id.to_string(), roles))
        .collect();
    serde_json::to_string(&raw)
        .map_err(|error| RepositoryError::InvalidRolesStructure(error.to_string()))
}

fn validate_json(content: &str) -> RepoResult<()> {
    let mapping = parse_json(content)?;
    for (user_id, roles) in &mapping {
        let mut seen = BTreeSet::new();
        for role in roles {
            if !seen.insert(role) {
                return Err(RepositoryError::DuplicateRole(format!(
                    "{role} (user {user_id})"
                )));
            }
        }
    }
    Ok(())
}

fn structure(message: impl Into<String>) -> RepositoryError {
    RepositoryError::InvalidRolesStructure(message.into())
}

/// Extracts the mandatory integer `id` attribute of a `user` element.
fn user_element_id(element: &BytesStart<'_>) -> RepoResult<u64> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|error| structure(error.to_string()))?;
        if attribute.key.as_ref() == b"id" {
            let value = attribute
                .unescape_value()
                .map_err(|error| structure(error.to_string()))?;
            return value
                .parse()
                .map_err(|_| structure(format!("non-integer user id {value:?}")));
        }
    }
    Err(structure("user element without an id attribute"))
}

/// Parses `<users><user id="N"><role>name</role>...</user>...</users>`.
fn parse_xml(content: &str) -> RepoResult<UserRoles> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut mapping = UserRoles::new();
    let mut current: Option<(u64, Vec<Role>)> = None;
    let mut in_role = false;
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|error| structure(error.to_string()))?;
        match event {
            Event::Start(element) => match element.name().as_ref() {
                b"users" => saw_root = true,
                b"user" => {
                    let id = user_element_id(&element)?;
                    if mapping.contains_key(&id) {
                        return Err(RepositoryError::DuplicateUserIdentifier(id.to_string()));
                    }
                    current = Some((id, Vec::new()));
                }
                b"role" => in_role = true,
                other => {
                    return Err(structure(format!(
                        "unexpected element {:?}",
                        String::from_utf8_lossy(other)
                    )))
                }
            },
            Event::Text(text) => {
                if in_role {
                    let value = text
                        .unescape()
                        .map_err(|error| structure(error.to_string()))?;
                    let role: Role = value.trim().parse()?;
                    if let Some((user_id, roles)) = current.as_mut() {
                        if roles.contains(&role) {
                            return Err(RepositoryError::DuplicateRole(format!(
                                "{role} (user {user_id})"
                            )));
                        }
                        roles.push(role);
                    }
                }
            }
            Event::End(element) => match element.name().as_ref() {
                b"role" => in_role = false,
                b"user" => {
                    if let Some((id, roles)) = current.take() {
                        mapping.insert(id, roles);
                    }
                }
                _ => {}
            },
            Event::Empty(element) => {
                if element.name().as_ref() == b"user" {
                    // A user with no roles.
                    let id = user_element_id(&element)?;
                    if mapping.contains_key(&id) {
                        return Err(RepositoryError::DuplicateUserIdentifier(id.to_string()));
                    }
                    mapping.insert(id, Vec::new());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !saw_root && !mapping.is_empty() {
        return Err(structure("missing users root element"));
    }
    Ok(mapping)
}

fn render_xml(mapping: &UserRoles) -> RepoResult<String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(BytesStart::new("users")))
        .map_err(|error| structure(error.to_string()))?;
    for (user_id, roles) in mapping {
        let mut user = BytesStart::new("user");
        user.push_attribute(("id", user_id.to_string().as_str()));
        writer
            .write_event(Event::Start(user))
            .map_err(|error| structure(error.to_string()))?;
        for role in roles {
            writer
                .write_event(Event::Start(BytesStart::new("role")))
                .map_err(|error| structure(error.to_string()))?;
            writer
                .write_event(Event::Text(BytesText::new(role.as_str())))
                .map_err(|error| structure(error.to_string()))?;
            writer
                .write_event(Event::End(BytesEnd::new("role")))
                .map_err(|error| structure(error.to_string()))?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("user")))
            .map_err(|error| structure(error.to_string()))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("users")))
        .map_err(|error| structure(error.to_string()))?;
    String::from_utf8(writer.into_inner())
        .map_err(|error| structure(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn store_with(encoding: RolesEncoding) -> (TempDir, RoleStore) {
        let temp = TempDir::new().unwrap();
        let store = RoleStore::new(temp.path());
        store.initialize(encoding).unwrap();
        (temp, store)
    }

    fn sample() -> UserRoles {
        UserRoles::from([
            (1, vec![Role::Admin, Role::Author]),
            (2, vec![Role::Reviewer]),
            (3, vec![]),
        ])
    }

    #[test]
    fn test_role_vocabulary_is_closed() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        let error = "superuser".parse::<Role>().unwrap_err();
        assert!(matches!(&error, RepositoryError::InvalidRole(_)));
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_file_reads_as_empty_mapping() {
        for encoding in [RolesEncoding::Txt, RolesEncoding::Json, RolesEncoding::Xml] {
            let (_temp, store) = store_with(encoding);
            assert!(store.read().unwrap().is_empty());
            store.validate().unwrap();
        }
    }

    #[test]
    fn test_round_trip_in_every_encoding() {
        for encoding in [RolesEncoding::Txt, RolesEncoding::Json, RolesEncoding::Xml] {
            let (_temp, store) = store_with(encoding);
            store.write(&sample()).unwrap();
            assert_eq!(store.read().unwrap(), sample(), "{encoding:?}");
            store.validate().unwrap();
        }
    }

    #[test]
    fn test_write_merges_over_existing_entries() {
        let (_temp, store) = store_with(RolesEncoding::Json);
        store.write(&sample()).unwrap();
        store
            .write(&UserRoles::from([(2, vec![Role::Manager]), (9, vec![Role::Visitor])]))
            .unwrap();

        let mapping = store.read().unwrap();
        assert_eq!(mapping[&1], vec![Role::Admin, Role::Author]);
        assert_eq!(mapping[&2], vec![Role::Manager]);
        assert_eq!(mapping[&9], vec![Role::Visitor]);
    }

    #[test]
    fn test_multiple_roles_files_rejected() {
        let (temp, store) = store_with(RolesEncoding::Txt);
        fs::write(temp.path().join("roles.json"), "").unwrap();
        assert!(matches!(
            store.read(),
            Err(RepositoryError::MultipleRolesFiles(_))
        ));
    }

    #[test]
    fn test_missing_roles_file() {
        let temp = TempDir::new().unwrap();
        let store = RoleStore::new(temp.path());
        assert!(matches!(
            store.read(),
            Err(RepositoryError::RolesFileMissing(_))
        ));
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("roles.yaml"), "").unwrap();
        let store = RoleStore::new(temp.path());
        assert!(matches!(
            store.read(),
            Err(RepositoryError::WrongRolesFileType(_))
        ));
    }

    #[test]
    fn test_txt_validation_flags_malformed_lines() {
        let temp = TempDir::new().unwrap();
        let store = RoleStore::new(temp.path());
        let path = temp.path().join("roles.txt");

        fs::write(&path, "1 admin\n").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::MissingDelimiter(1))
        ));

        fs::write(&path, ": admin\n").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::MissingUserIdentifier(1))
        ));

        fs::write(&path, "1: admin\n1: visitor\n").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::DuplicateUserIdentifier(_))
        ));

        fs::write(&path, "1: admin,admin\n").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::DuplicateRole(_))
        ));

        fs::write(&path, "1: overlord\n").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_json_validation_flags_bad_structure() {
        let temp = TempDir::new().unwrap();
        let store = RoleStore::new(temp.path());
        let path = temp.path().join("roles.json");

        fs::write(&path, r#"{"abc": ["admin"]}"#).unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::InvalidRolesStructure(_))
        ));

        fs::write(&path, r#"{"1": "admin"}"#).unwrap();
        assert!(store.validate().is_err());

        fs::write(&path, r#"{"1": ["admin", "admin"]}"#).unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::DuplicateRole(_))
        ));
    }

    #[test]
    fn test_xml_validation_flags_bad_structure() {
        let temp = TempDir::new().unwrap();
        let store = RoleStore::new(temp.path());
        let path = temp.path().join("roles.xml");

        fs::write(&path, "<users><user><role>admin</role></user></users>").unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::InvalidRolesStructure(_))
        ));

        fs::write(
            &path,
            r#"<users><user id="1"><role>overlord</role></user></users>"#,
        )
        .unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::InvalidRole(_))
        ));

        fs::write(
            &path,
            r#"<users><user id="1"><role>admin</role></user><user id="1"/></users>"#,
        )
        .unwrap();
        assert!(matches!(
            store.validate(),
            Err(RepositoryError::DuplicateUserIdentifier(_))
        ));
    }
}
