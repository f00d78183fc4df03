//! The document review workflow.
//!
//! A review moves through six stages in a fixed order: submission, two
//! reviewing requests, two reviewer responses and a final evaluation. Every
//! stage may notify the involved users through a [`Messenger`]; a failed
//! delivery is logged and never fails the stage itself.

use crate::messenger::{Message, Messenger};
use crate::{RepoResult, RepositoryError};
use chrono::NaiveDate;
use tracing::warn;

/// Whether a submission or reviewing request has been sent yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    NotSent,
    Sent,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::NotSent => "not_sent",
            RequestState::Sent => "sent",
        }
    }
}

/// The parties and channel for one review notification.
pub struct Notice<'a> {
    pub messenger: &'a dyn Messenger,
    pub sender: String,
    pub recipient: String,
    pub date: NaiveDate,
}

/// The review of one document.
///
/// All stage fields start unset; each setter enforces that the preceding
/// stages have completed.
#[derive(Debug, Default)]
pub struct Review {
    submission: RequestState,
    request_1: RequestState,
    request_2: RequestState,
    response_1: Option<bool>,
    response_2: Option<bool>,
    evaluation: Option<bool>,
}

impl Review {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission(&self) -> RequestState {
        self.submission
    }

    pub fn request_1(&self) -> RequestState {
        self.request_1
    }

    pub fn request_2(&self) -> RequestState {
        self.request_2
    }

    pub fn response_1(&self) -> Option<bool> {
        self.response_1
    }

    pub fn response_2(&self) -> Option<bool> {
        self.response_2
    }

    pub fn evaluation(&self) -> Option<bool> {
        self.evaluation
    }

    /// Submits the document for review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless every stage,
    /// this one included, is still at its initial value.
    pub fn submit(&mut self, message: &str, notice: Option<&Notice<'_>>) -> RepoResult<()> {
        let untouched = self.submission == RequestState::NotSent
            && self.request_1 == RequestState::NotSent
            && self.request_2 == RequestState::NotSent
            && self.response_1.is_none()
            && self.response_2.is_none()
            && self.evaluation.is_none();
        if !untouched {
            return Err(RepositoryError::ReviewPrecondition(
                "submission requires a fresh review",
            ));
        }
        self.submission = RequestState::Sent;
        deliver(notice, message);
        Ok(())
    }

    /// Sends the first reviewing request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless the submission
    /// was sent and this request was not.
    pub fn send_request_1(&mut self, message: &str, notice: Option<&Notice<'_>>) -> RepoResult<()> {
        if self.submission != RequestState::Sent || self.request_1 == RequestState::Sent {
            return Err(RepositoryError::ReviewPrecondition(
                "first reviewing request requires a sent submission",
            ));
        }
        self.request_1 = RequestState::Sent;
        deliver(notice, message);
        Ok(())
    }

    /// Sends the second reviewing request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless the submission
    /// and the first request were sent and this request was not.
    pub fn send_request_2(&mut self, message: &str, notice: Option<&Notice<'_>>) -> RepoResult<()> {
        if self.submission != RequestState::Sent
            || self.request_1 != RequestState::Sent
            || self.request_2 == RequestState::Sent
        {
            return Err(RepositoryError::ReviewPrecondition(
                "second reviewing request requires the first to be sent",
            ));
        }
        self.request_2 = RequestState::Sent;
        deliver(notice, message);
        Ok(())
    }

    /// Records the first reviewer's verdict.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless both reviewing
    /// requests were sent and this response is still unset.
    pub fn set_response_1(
        &mut self,
        response: bool,
        message: &str,
        notice: Option<&Notice<'_>>,
    ) -> RepoResult<()> {
        if self.request_1 != RequestState::Sent
            || self.request_2 != RequestState::Sent
            || self.response_1.is_some()
        {
            return Err(RepositoryError::ReviewPrecondition(
                "first response requires both reviewing requests to be sent",
            ));
        }
        self.response_1 = Some(response);
        deliver(notice, message);
        Ok(())
    }

    /// Records the second reviewer's verdict.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless the first
    /// response was recorded and this response is still unset.
    pub fn set_response_2(
        &mut self,
        response: bool,
        message: &str,
        notice: Option<&Notice<'_>>,
    ) -> RepoResult<()> {
        if self.request_2 != RequestState::Sent
            || self.response_1.is_none()
            || self.response_2.is_some()
        {
            return Err(RepositoryError::ReviewPrecondition(
                "second response requires the first response to be recorded",
            ));
        }
        self.response_2 = Some(response);
        deliver(notice, message);
        Ok(())
    }

    /// Evaluates the review: the result is positive only when both
    /// reviewers responded positively.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::ReviewPrecondition` unless both responses
    /// were recorded.
    pub fn evaluate(&mut self, message: &str, notice: Option<&Notice<'_>>) -> RepoResult<bool> {
        let (Some(first), Some(second)) = (self.response_1, self.response_2) else {
            return Err(RepositoryError::ReviewPrecondition(
                "evaluation requires both responses to be recorded",
            ));
        };
        let result = first && second;
        self.evaluation = Some(result);
        deliver(notice, message);
        Ok(result)
    }
}

/// Best-effort notification: a delivery failure is logged, not surfaced.
fn deliver(notice: Option<&Notice<'_>>, content: &str) {
    let Some(notice) = notice else {
        return;
    };
    let message = Message {
        sender: notice.sender.clone(),
        recipient: notice.recipient.clone(),
        date: notice.date,
        content: content.to_owned(),
    };
    if let Err(error) = notice.messenger.send(&message) {
        warn!(%error, "failed to deliver review notification");
    }
}
