use serde::Deserialize;

use super::types::nullable;
use crate::webhooks::events::{PullRequest, User};

/// Payload shared by `pr:opened`, `pr:merged`, `pr:declined` and `pr:deleted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub pull_request: Option<PullRequest>,
}

/// Sent on `pr:modified`, when the title, description or target branch changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestModifiedEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub pull_request: Option<PullRequest>,
    #[serde(deserialize_with = "nullable")]
    pub previous_title: String,
    pub previous_description: Option<String>,
    pub previous_target: Option<PullRequestTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestTarget {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub display_id: String,
    #[serde(deserialize_with = "nullable")]
    pub r#type: String,
    #[serde(deserialize_with = "nullable")]
    pub latest_commit: String,
    #[serde(deserialize_with = "nullable")]
    pub latest_changeset: String,
}

/// Sent on `pr:from_ref_updated`, when new commits land on the source branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestFromRefUpdatedEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub pull_request: Option<PullRequest>,
    #[serde(deserialize_with = "nullable")]
    pub previous_from_hash: String,
}
