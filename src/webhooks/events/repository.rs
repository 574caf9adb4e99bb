use serde::Deserialize;

use super::types::nullable;
use crate::webhooks::events::{Repository, User};

/// Sent on `repo:modified`, when a repository is renamed or moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryModifiedEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub old: Option<Repository>,
    pub new: Option<Repository>,
}

/// Sent on `repo:forked`. `repository` is the new fork, its `origin` the forked repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepositoryForkedEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub repository: Option<Repository>,
}
