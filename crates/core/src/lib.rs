//! Core library of the Electronic Document Repository.
//!
//! An EDR repository is a directory tree of flat text records: documents,
//! users, projects and their role assignments, plus a review workflow and
//! zip-based backup. This crate contains the entities, the per-collection
//! managers and the [`Repository`] facade that wires them to one on-disk
//! layout. The record codec lives in the `edr_inifmt` crate.
//!
//! Typical use goes through the facade:
//!
//! ```no_run
//! use edr_core::{Repository, RepositoryConfig};
//!
//! # fn main() -> Result<(), edr_core::RepositoryError> {
//! let repository = Repository::open(RepositoryConfig::new("archive", "repositories/archive"))?;
//! let documents = repository.documents()?;
//! println!("{} documents", documents.count()?);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod messenger;
pub mod project;
pub mod repository;
pub mod review;
pub mod roles;
pub mod storage;
pub mod timestamp;
pub mod user;

pub use backup::BackupSelection;
pub use config::RepositoryConfig;
pub use document::{Document, DocumentManager, DocumentState};
pub use error::{ErrorKind, RepoResult, RepositoryError};
pub use messenger::{FsMessenger, Message, Messenger};
pub use project::{Project, ProjectManager};
pub use repository::Repository;
pub use review::{Notice, RequestState, Review};
pub use roles::{Role, RoleStore, RolesEncoding, UserRoles};
pub use user::{User, UserManager};
