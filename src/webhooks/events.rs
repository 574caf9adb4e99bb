use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::trace;

mod pull_request;
mod pull_request_review;
mod push;
mod repository;
mod types;

pub use pull_request::*;
pub use pull_request_review::*;
pub use push::*;
pub use repository::*;
pub use types::*;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The server may add event keys over time: callers should acknowledge and skip these.
    #[error("unknown X-Event-Key in message: {0:?}")]
    UnknownEventKey(String),
    #[error("malformed {key} payload: {source}")]
    MalformedPayload {
        key: EventKey,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::UnknownEventKey(_))
    }
}

/// Every event key Bitbucket Server sends that this crate knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    Push,
    RepositoryModified,
    RepositoryForked,
    PullRequestOpened,
    PullRequestModified,
    PullRequestFromRefUpdated,
    PullRequestReviewersUpdated,
    PullRequestApproved,
    PullRequestUnapproved,
    PullRequestNeedsWork,
    PullRequestMerged,
    PullRequestDeclined,
    PullRequestDeleted,
}

impl EventKey {
    pub const ALL: [EventKey; 13] = [
        EventKey::Push,
        EventKey::RepositoryModified,
        EventKey::RepositoryForked,
        EventKey::PullRequestOpened,
        EventKey::PullRequestModified,
        EventKey::PullRequestFromRefUpdated,
        EventKey::PullRequestReviewersUpdated,
        EventKey::PullRequestApproved,
        EventKey::PullRequestUnapproved,
        EventKey::PullRequestNeedsWork,
        EventKey::PullRequestMerged,
        EventKey::PullRequestDeclined,
        EventKey::PullRequestDeleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKey::Push => "repo:refs_changed",
            EventKey::RepositoryModified => "repo:modified",
            EventKey::RepositoryForked => "repo:forked",
            EventKey::PullRequestOpened => "pr:opened",
            EventKey::PullRequestModified => "pr:modified",
            EventKey::PullRequestFromRefUpdated => "pr:from_ref_updated",
            EventKey::PullRequestReviewersUpdated => "pr:reviewer:updated",
            EventKey::PullRequestApproved => "pr:reviewer:approved",
            EventKey::PullRequestUnapproved => "pr:reviewer:unapproved",
            EventKey::PullRequestNeedsWork => "pr:reviewer:needs_work",
            EventKey::PullRequestMerged => "pr:merged",
            EventKey::PullRequestDeclined => "pr:declined",
            EventKey::PullRequestDeleted => "pr:deleted",
        }
    }

    /// Decodes `payload` into a fresh event of the shape this key selects.
    pub fn decode(self, payload: &[u8]) -> Result<BitbucketEvent, DecodeError> {
        trace!("decoding {} payload ({} bytes)", self, payload.len());

        let event = match self {
            EventKey::Push => BitbucketEvent::Push(self.parse(payload)?),
            EventKey::RepositoryModified => {
                BitbucketEvent::RepositoryModified(self.parse(payload)?)
            }
            EventKey::RepositoryForked => BitbucketEvent::RepositoryForked(self.parse(payload)?),
            EventKey::PullRequestOpened => BitbucketEvent::PullRequestOpened(self.parse(payload)?),
            EventKey::PullRequestModified => {
                BitbucketEvent::PullRequestModified(self.parse(payload)?)
            }
            EventKey::PullRequestFromRefUpdated => {
                BitbucketEvent::PullRequestFromRefUpdated(self.parse(payload)?)
            }
            EventKey::PullRequestReviewersUpdated => {
                BitbucketEvent::PullRequestReviewersUpdated(self.parse(payload)?)
            }
            EventKey::PullRequestApproved => {
                BitbucketEvent::PullRequestApproved(self.parse(payload)?)
            }
            EventKey::PullRequestUnapproved => {
                BitbucketEvent::PullRequestUnapproved(self.parse(payload)?)
            }
            EventKey::PullRequestNeedsWork => {
                BitbucketEvent::PullRequestNeedsWork(self.parse(payload)?)
            }
            EventKey::PullRequestMerged => BitbucketEvent::PullRequestMerged(self.parse(payload)?),
            EventKey::PullRequestDeclined => {
                BitbucketEvent::PullRequestDeclined(self.parse(payload)?)
            }
            EventKey::PullRequestDeleted => {
                BitbucketEvent::PullRequestDeleted(self.parse(payload)?)
            }
        };

        Ok(event)
    }

    fn parse<T: serde::de::DeserializeOwned>(self, payload: &[u8]) -> Result<T, DecodeError> {
        serde_json::from_slice(payload)
            .map_err(|source| DecodeError::MalformedPayload { key: self, source })
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKey {
    type Err = DecodeError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        EventKey::ALL
            .into_iter()
            .find(|event_key| event_key.as_str() == key)
            .ok_or_else(|| DecodeError::UnknownEventKey(key.to_owned()))
    }
}

/// A decoded webhook event, one variant per [`EventKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitbucketEvent {
    Push(PushEvent),
    RepositoryModified(RepositoryModifiedEvent),
    RepositoryForked(RepositoryForkedEvent),
    PullRequestOpened(PullRequestEvent),
    PullRequestModified(PullRequestModifiedEvent),
    PullRequestFromRefUpdated(PullRequestFromRefUpdatedEvent),
    PullRequestReviewersUpdated(PullRequestReviewersUpdatedEvent),
    PullRequestApproved(PullRequestReviewerEvent),
    PullRequestUnapproved(PullRequestReviewerEvent),
    PullRequestNeedsWork(PullRequestReviewerEvent),
    PullRequestMerged(PullRequestEvent),
    PullRequestDeclined(PullRequestEvent),
    PullRequestDeleted(PullRequestEvent),
}

impl BitbucketEvent {
    pub fn key(&self) -> EventKey {
        match self {
            BitbucketEvent::Push(_) => EventKey::Push,
            BitbucketEvent::RepositoryModified(_) => EventKey::RepositoryModified,
            BitbucketEvent::RepositoryForked(_) => EventKey::RepositoryForked,
            BitbucketEvent::PullRequestOpened(_) => EventKey::PullRequestOpened,
            BitbucketEvent::PullRequestModified(_) => EventKey::PullRequestModified,
            BitbucketEvent::PullRequestFromRefUpdated(_) => EventKey::PullRequestFromRefUpdated,
            BitbucketEvent::PullRequestReviewersUpdated(_) => EventKey::PullRequestReviewersUpdated,
            BitbucketEvent::PullRequestApproved(_) => EventKey::PullRequestApproved,
            BitbucketEvent::PullRequestUnapproved(_) => EventKey::PullRequestUnapproved,
            BitbucketEvent::PullRequestNeedsWork(_) => EventKey::PullRequestNeedsWork,
            BitbucketEvent::PullRequestMerged(_) => EventKey::PullRequestMerged,
            BitbucketEvent::PullRequestDeclined(_) => EventKey::PullRequestDeclined,
            BitbucketEvent::PullRequestDeleted(_) => EventKey::PullRequestDeleted,
        }
    }

    /// The `date` field as sent, e.g. `2017-09-19T09:58:11+1000`.
    pub fn date(&self) -> &str {
        match self {
            BitbucketEvent::Push(event) => &event.date,
            BitbucketEvent::RepositoryModified(event) => &event.date,
            BitbucketEvent::RepositoryForked(event) => &event.date,
            BitbucketEvent::PullRequestModified(event) => &event.date,
            BitbucketEvent::PullRequestFromRefUpdated(event) => &event.date,
            BitbucketEvent::PullRequestReviewersUpdated(event) => &event.date,
            BitbucketEvent::PullRequestApproved(event)
            | BitbucketEvent::PullRequestUnapproved(event)
            | BitbucketEvent::PullRequestNeedsWork(event) => &event.date,
            BitbucketEvent::PullRequestOpened(event)
            | BitbucketEvent::PullRequestMerged(event)
            | BitbucketEvent::PullRequestDeclined(event)
            | BitbucketEvent::PullRequestDeleted(event) => &event.date,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        parse_event_date(self.date())
    }

    pub fn actor(&self) -> Option<&User> {
        match self {
            BitbucketEvent::Push(event) => event.actor.as_ref(),
            BitbucketEvent::RepositoryModified(event) => event.actor.as_ref(),
            BitbucketEvent::RepositoryForked(event) => event.actor.as_ref(),
            BitbucketEvent::PullRequestModified(event) => event.actor.as_ref(),
            BitbucketEvent::PullRequestFromRefUpdated(event) => event.actor.as_ref(),
            BitbucketEvent::PullRequestReviewersUpdated(event) => event.actor.as_ref(),
            BitbucketEvent::PullRequestApproved(event)
            | BitbucketEvent::PullRequestUnapproved(event)
            | BitbucketEvent::PullRequestNeedsWork(event) => event.actor.as_ref(),
            BitbucketEvent::PullRequestOpened(event)
            | BitbucketEvent::PullRequestMerged(event)
            | BitbucketEvent::PullRequestDeclined(event)
            | BitbucketEvent::PullRequestDeleted(event) => event.actor.as_ref(),
        }
    }

    /// The pull request the event is about, for `pr:*` events.
    pub fn pull_request(&self) -> Option<&PullRequest> {
        match self {
            BitbucketEvent::Push(_)
            | BitbucketEvent::RepositoryModified(_)
            | BitbucketEvent::RepositoryForked(_) => None,
            BitbucketEvent::PullRequestModified(event) => event.pull_request.as_ref(),
            BitbucketEvent::PullRequestFromRefUpdated(event) => event.pull_request.as_ref(),
            BitbucketEvent::PullRequestReviewersUpdated(event) => event.pull_request.as_ref(),
            BitbucketEvent::PullRequestApproved(event)
            | BitbucketEvent::PullRequestUnapproved(event)
            | BitbucketEvent::PullRequestNeedsWork(event) => event.pull_request.as_ref(),
            BitbucketEvent::PullRequestOpened(event)
            | BitbucketEvent::PullRequestMerged(event)
            | BitbucketEvent::PullRequestDeclined(event)
            | BitbucketEvent::PullRequestDeleted(event) => event.pull_request.as_ref(),
        }
    }

    /// The repository the event happened in. For `repo:modified` this is the repository after
    /// the change.
    pub fn repository(&self) -> Option<&Repository> {
        match self {
            BitbucketEvent::Push(event) => event.repository.as_ref(),
            BitbucketEvent::RepositoryModified(event) => event.new.as_ref(),
            BitbucketEvent::RepositoryForked(event) => event.repository.as_ref(),
            _ => self.pull_request().and_then(PullRequest::repository),
        }
    }
}

/// Decodes a webhook payload according to the event key it was delivered with.
pub fn decode(event_key: &str, payload: &[u8]) -> Result<BitbucketEvent, DecodeError> {
    let key: EventKey = event_key.parse()?;
    key.decode(payload)
}
