use serde::Deserialize;

use super::types::nullable;
use crate::webhooks::events::{Repository, User};

/// Sent on `repo:refs_changed`: commits pushed, or a branch or tag created or deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushEvent {
    #[serde(deserialize_with = "nullable")]
    pub event_key: String,
    #[serde(deserialize_with = "nullable")]
    pub date: String,
    pub actor: Option<User>,
    pub repository: Option<Repository>,
    #[serde(deserialize_with = "nullable")]
    pub changes: Vec<RefChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefChange {
    #[serde(deserialize_with = "nullable")]
    pub r#ref: Ref,
    #[serde(deserialize_with = "nullable")]
    pub ref_id: String,
    #[serde(deserialize_with = "nullable")]
    pub from_hash: String,
    #[serde(deserialize_with = "nullable")]
    pub to_hash: String,
    /// `ADD`, `UPDATE` or `DELETE`.
    #[serde(deserialize_with = "nullable")]
    pub r#type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ref {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub display_id: String,
    /// `BRANCH` or `TAG`.
    #[serde(deserialize_with = "nullable")]
    pub r#type: String,
}
