//! Message delivery between users.
//!
//! Messages are flat text files of four lines (sender, recipient, date,
//! content) named by message id. Delivery is a side effect of the review
//! workflow; a failed delivery never fails the review step itself.

use crate::storage::next_id;
use crate::{RepoResult, RepositoryError};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

/// A message from one user to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub recipient: String,
    pub date: NaiveDate,
    pub content: String,
}

/// Delivers and retrieves messages. Implemented by [`FsMessenger`] for
/// production and by in-memory doubles in tests.
pub trait Messenger {
    /// Delivers a message and returns its assigned identifier.
    fn send(&self, message: &Message) -> RepoResult<u64>;

    /// Retrieves a previously delivered message by its identifier.
    fn receive(&self, id: u64) -> RepoResult<Message>;
}

/// Stores messages as numbered files in a directory.
#[derive(Debug)]
pub struct FsMessenger {
    location: PathBuf,
}

impl FsMessenger {
    /// Creates a messenger, creating the message directory if needed.
    pub fn new(location: impl Into<PathBuf>) -> RepoResult<Self> {
        let location = location.into();
        fs::create_dir_all(&location)?;
        Ok(Self { location })
    }
}

impl Messenger for FsMessenger {
    fn send(&self, message: &Message) -> RepoResult<u64> {
        let id = next_id(&self.location)?;
        let record = format!(
            "{}\n{}\n{}\n{}\n",
            message.sender,
            message.recipient,
            message.date.format("%Y-%m-%d"),
            message.content
        );
        fs::write(self.location.join(id.to_string()), record)?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::MissingPath` if no message with this id
    /// exists, or `MalformedRecord` for a truncated file.
    fn receive(&self, id: u64) -> RepoResult<Message> {
        let path = self.location.join(id.to_string());
        if !path.exists() {
            return Err(RepositoryError::MissingPath(path));
        }
        let content = fs::read_to_string(path)?;
        let mut lines = content.lines();
        let mut field = |name: &str| -> RepoResult<&str> {
            lines.next().ok_or_else(|| {
                RepositoryError::MalformedRecord(format!("message {id} is missing its {name}"))
            })
        };
        let sender = field("sender")?.to_owned();
        let recipient = field("recipient")?.to_owned();
        let date = NaiveDate::parse_from_str(field("date")?, "%Y-%m-%d").map_err(|_| {
            RepositoryError::MalformedRecord(format!("message {id} has an invalid date"))
        })?;
        let body = field("content")?.to_owned();
        Ok(Message {
            sender,
            recipient,
            date,
            content: body,
        })
    }
}
