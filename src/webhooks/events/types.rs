use std::fmt::Display;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::utils::shorten_content;

/// Deserializes an explicit `null` like a missing field, into the default value.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the `date` field of an event, e.g. `2017-09-19T09:58:11+1000`.
pub fn parse_event_date(date: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(date)
        .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub email_address: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub id: u64,
    #[serde(deserialize_with = "nullable")]
    pub display_name: String,
    #[serde(deserialize_with = "nullable")]
    pub active: bool,
    #[serde(deserialize_with = "nullable")]
    pub slug: String,
    #[serde(deserialize_with = "nullable")]
    pub r#type: String,
    pub links: Option<SelfLinks>,
}

impl Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.display_name)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    #[serde(deserialize_with = "nullable")]
    pub key: String,
    #[serde(deserialize_with = "nullable")]
    pub id: u64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub public: bool,
    #[serde(deserialize_with = "nullable")]
    pub r#type: String,
    // only set for personal projects
    pub owner: Option<User>,
    pub links: Option<SelfLinks>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Repository {
    #[serde(deserialize_with = "nullable")]
    pub slug: String,
    #[serde(deserialize_with = "nullable")]
    pub id: u64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub hierarchy_id: String,
    #[serde(deserialize_with = "nullable")]
    pub scm_id: String,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
    pub status_message: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub forkable: bool,
    pub project: Option<Project>,
    #[serde(deserialize_with = "nullable")]
    pub public: bool,
    pub links: Option<RepositoryLinks>,
    /// Repository this one was forked from, present on forks.
    pub origin: Option<Box<Repository>>,
}

impl Repository {
    /// `PROJECT/slug`, the way Bitbucket Server names a repository in its UI.
    pub fn full_name(&self) -> String {
        match &self.project {
            Some(project) => format!("{}/{}", project.key, self.slug),
            None => self.slug.clone(),
        }
    }

    pub fn html_url(&self) -> Option<Url> {
        self.links.as_ref()?.self_links.iter().find_map(NamelessLink::url)
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequest {
    #[serde(deserialize_with = "nullable")]
    pub id: u64,
    #[serde(deserialize_with = "nullable")]
    pub version: u64,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
    #[serde(deserialize_with = "nullable")]
    pub open: bool,
    #[serde(deserialize_with = "nullable")]
    pub closed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub updated_date: Option<DateTime<Utc>>,
    pub from_ref: Option<PullRequestRef>,
    pub to_ref: Option<PullRequestRef>,
    #[serde(deserialize_with = "nullable")]
    pub locked: bool,
    pub author: Option<PullRequestParticipant>,
    #[serde(deserialize_with = "nullable")]
    pub reviewers: Vec<PullRequestParticipant>,
    #[serde(deserialize_with = "nullable")]
    pub participants: Vec<PullRequestParticipant>,
    pub links: Option<SelfLinks>,
}

impl PullRequest {
    pub fn html_url(&self) -> Option<Url> {
        self.links.as_ref()?.self_links.iter().find_map(NamelessLink::url)
    }

    /// Repository the pull request targets.
    pub fn repository(&self) -> Option<&Repository> {
        self.to_ref.as_ref()?.repository.as_ref()
    }
}

impl Display for PullRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PR #{}: {}", self.id, shorten_content(&self.title))?;
        if let Some(user) = self.author.as_ref().and_then(|author| author.user.as_ref()) {
            write!(f, " by {}", user)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestRef {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub display_id: String,
    #[serde(deserialize_with = "nullable")]
    pub latest_commit: String,
    pub repository: Option<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PullRequestParticipant {
    pub user: Option<User>,
    // only populated for reviewers
    pub last_reviewed_commit: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub role: String,
    #[serde(deserialize_with = "nullable")]
    pub approved: bool,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SelfLinks {
    #[serde(rename = "self", deserialize_with = "nullable")]
    pub self_links: Vec<NamelessLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryLinks {
    #[serde(rename = "self", deserialize_with = "nullable")]
    pub self_links: Vec<NamelessLink>,
    #[serde(deserialize_with = "nullable")]
    pub clone: Vec<Link>,
}

/// A link as sent, `href` may be empty or relative to the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NamelessLink {
    #[serde(deserialize_with = "nullable")]
    pub href: String,
}

impl NamelessLink {
    /// The link as an absolute URL, if it is one.
    pub fn url(&self) -> Option<Url> {
        Url::parse(&self.href).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Link {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub href: String,
}
