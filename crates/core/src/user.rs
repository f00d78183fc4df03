//! Users and the user manager.
//!
//! A user is stored in the users directory as a flat text file named by its
//! identifier, holding exactly five lines: first name, family name, birth
//! date, email and password. Role assignments live separately in the roles
//! file managed by [`RoleStore`].

use crate::document::AuthorResolver;
use crate::roles::{Role, RoleStore, UserRoles};
use crate::storage::{existing_ids, next_id};
use crate::{RepoResult, RepositoryError};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // Lowercase local and domain parts, dot-separated, 2-4 letter TLD.
    Regex::new(r"^[_a-z0-9-]+(\.[_a-z0-9-]+)*@[a-z0-9-]+(\.[a-z0-9-]+)*(\.[a-z]{2,4})$")
        .unwrap_or_else(|_| unreachable!("static email pattern is valid"))
});

/// A user of the repository.
///
/// All fields are validated at construction; an instance is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    first_name: String,
    family_name: String,
    birth: NaiveDate,
    email: String,
    password: String,
}

impl User {
    /// Creates a user, validating every field.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InvalidName` for a name that is empty or
    /// not alphanumeric, `InvalidEmail` for an email the pattern rejects,
    /// and `InvalidPassword` for an empty password.
    pub fn new(
        first_name: impl Into<String>,
        family_name: impl Into<String>,
        birth: NaiveDate,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> RepoResult<Self> {
        let first_name = first_name.into();
        let family_name = family_name.into();
        let email = email.into();
        let password = password.into();

        if !Self::is_valid_name(&first_name) {
            return Err(RepositoryError::InvalidName(first_name));
        }
        if !Self::is_valid_name(&family_name) {
            return Err(RepositoryError::InvalidName(family_name));
        }
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(RepositoryError::InvalidEmail(email));
        }
        if password.is_empty() {
            return Err(RepositoryError::InvalidPassword);
        }

        Ok(Self {
            first_name,
            family_name,
            birth,
            email,
            password,
        })
    }

    fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && name.chars().all(char::is_alphanumeric)
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// First and family name joined by a single space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.family_name)
    }

    pub fn birth(&self) -> NaiveDate {
        self.birth
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.full_name(),
            self.birth.format("%Y-%m-%d"),
            self.email
        )
    }
}

/// Manages the user records and role assignments of one users directory.
#[derive(Debug)]
pub struct UserManager {
    location: PathBuf,
    store: RoleStore,
}

impl UserManager {
    /// Creates a manager bound to an existing users directory.
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
        let store = RoleStore::new(&location);
        Ok(Self { location, store })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// The role store backing this manager.
    pub fn roles(&self) -> &RoleStore {
        &self.store
    }

    fn user_path(&self, id: u64) -> PathBuf {
        self.location.join(id.to_string())
    }

    /// Persists a new user and returns its allocated identifier.
    pub fn add(&self, user: &User) -> RepoResult<u64> {
        let id = next_id(&self.location)?;
        self.save(id, user)?;
        Ok(id)
    }

    /// Replaces an existing user record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UserNotFound` if `id` is absent.
    pub fn update(&self, id: u64, user: &User) -> RepoResult<()> {
        if !self.user_path(id).exists() {
            return Err(RepositoryError::UserNotFound(id));
        }
        self.save(id, user)
    }

    /// Deletes a user record. Role assignments are left for the roles file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UserNotFound` if `id` is absent.
    pub fn remove(&self, id: u64) -> RepoResult<()> {
        let path = self.user_path(id);
        if !path.exists() {
            return Err(RepositoryError::UserNotFound(id));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// Loads one user by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UserNotFound` if `id` is absent, or a
    /// Format-kind error for a record with missing or invalid lines.
    pub fn find_by_id(&self, id: u64) -> RepoResult<User> {
        let path = self.user_path(id);
        if !path.exists() {
            return Err(RepositoryError::UserNotFound(id));
        }
        let content = fs::read_to_string(path)?;
        let mut lines = content.lines();
        let mut field = |name: &str| -> RepoResult<&str> {
            lines.next().ok_or_else(|| {
                RepositoryError::MalformedRecord(format!("user {id} record is missing {name}"))
            })
        };
        let first_name = field("first name")?;
        let family_name = field("family name")?;
        let birth = NaiveDate::parse_from_str(field("birth date")?, "%Y-%m-%d").map_err(|_| {
            RepositoryError::MalformedRecord(format!("user {id} has an invalid birth date"))
        })?;
        let email = field("email")?;
        let password = field("password")?;
        User::new(first_name, family_name, birth, email, password)
    }

    /// Ids of every user record in the directory.
    pub fn list_ids(&self) -> RepoResult<Vec<u64>> {
        let mut ids = existing_ids(&self.location)?;
        ids.sort_unstable();
        Ok(ids)
    }

    pub fn count(&self) -> RepoResult<usize> {
        Ok(self.list_ids()?.len())
    }

    /// Finds users whose full name contains `name` case-insensitively.
    ///
    /// A substring query, so "ann" matches both "Ann Veal" and "Joanna
    /// Teplin". Returns an empty vector when nothing matches.
    pub fn find_by_name(&self, name: &str) -> RepoResult<Vec<u64>> {
        let needle = name.to_lowercase();
        let mut found = Vec::new();
        for id in self.list_ids()? {
            let user = self.find_by_id(id)?;
            if user.full_name().to_lowercase().contains(&needle) {
                found.push(id);
            }
        }
        Ok(found)
    }

    /// Finds users whose email contains `email` case-insensitively.
    pub fn find_by_email(&self, email: &str) -> RepoResult<Vec<u64>> {
        let needle = email.to_lowercase();
        let mut found = Vec::new();
        for id in self.list_ids()? {
            let user = self.find_by_id(id)?;
            if user.email().to_lowercase().contains(&needle) {
                found.push(id);
            }
        }
        Ok(found)
    }

    /// Loads every user holding the given role.
    pub fn find_by_role(&self, role: Role) -> RepoResult<Vec<(u64, User)>> {
        let mut found = Vec::new();
        for (id, roles) in self.store.read()? {
            if roles.contains(&role) {
                found.push((id, self.find_by_id(id)?));
            }
        }
        Ok(found)
    }

    /// Assigns a role to a user. Assigning a role the user already holds is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UserNotFound` if `id` is absent.
    pub fn add_role(&self, id: u64, role: Role) -> RepoResult<()> {
        self.find_by_id(id)?;
        let mut roles = self.store.read()?;
        let assigned = roles.entry(id).or_default();
        if !assigned.contains(&role) {
            assigned.push(role);
        }
        self.store.write(&roles)
    }

    /// Withdraws a role from a user. Removing a role the user does not hold
    /// is a no-op; the user's (possibly empty) entry stays in the file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UserNotFound` if `id` is absent, and
    /// `NoRolesForUser` if the user has no entry in the roles file.
    pub fn remove_role(&self, id: u64, role: Role) -> RepoResult<()> {
        self.find_by_id(id)?;
        let mut roles = self.store.read()?;
        let assigned = roles
            .get_mut(&id)
            .ok_or(RepositoryError::NoRolesForUser(id))?;
        assigned.retain(|held| *held != role);
        self.store.write(&roles)
    }

    /// Whether the user holds the given role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NoRolesForUser` if the user has no entry in
    /// the roles file.
    pub fn has_role(&self, id: u64, role: Role) -> RepoResult<bool> {
        let roles = self.store.read()?;
        let assigned = roles.get(&id).ok_or(RepositoryError::NoRolesForUser(id))?;
        Ok(assigned.contains(&role))
    }

    /// Inverts the role mapping: every role to the users holding it.
    pub fn users_by_role(&self) -> RepoResult<BTreeMap<Role, Vec<u64>>> {
        let mut inverted: BTreeMap<Role, Vec<u64>> = BTreeMap::new();
        for (id, roles) in self.store.read()? {
            for role in roles {
                inverted.entry(role).or_default().push(id);
            }
        }
        Ok(inverted)
    }

    /// Reads the whole role mapping.
    pub fn all_roles(&self) -> RepoResult<UserRoles> {
        self.store.read()
    }

    fn save(&self, id: u64, user: &User) -> RepoResult<()> {
        let record = format!(
            "{}\n{}\n{}\n{}\n{}\n",
            user.first_name,
            user.family_name,
            user.birth.format("%Y-%m-%d"),
            user.email,
            user.password
        );
        fs::write(self.user_path(id), record)?;
        Ok(())
    }
}

impl AuthorResolver for UserManager {
    fn resolve_author_name(&self, name: &str) -> RepoResult<Vec<u64>> {
        self.find_by_name(name)
    }
}
