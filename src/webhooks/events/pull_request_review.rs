use serde::Deserialize;

use super::types::nullable;
use crate::webhooks::events::{PullRequest, PullRequestParticipant, User};

/// Payload shared by `pr:reviewer:approved`, `pr:reviewer:unapproved` and
/// `pr:reviewer:needs_work`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestReviewerEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub pull_request: Option<PullRequest>,
    pub participant: Option<PullRequestParticipant>,
    /// `UNAPPROVED`, `NEEDS_WORK` or `APPROVED`.
    #[serde(deserialize_with = "nullable")]
    pub previous_status: String,
}

/// Sent on `pr:reviewer:updated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestReviewersUpdatedEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub pull_request: Option<PullRequest>,
    #[serde(deserialize_with = "nullable")]
    pub added_reviewers: Vec<User>,
    #[serde(deserialize_with = "nullable")]
    pub removed_reviewers: Vec<User>,
}
