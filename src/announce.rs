use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace};

use crate::{
    server::Delivery,
    webhooks::events::{
        BitbucketEvent, PullRequest, PullRequestEvent, PullRequestReviewerEvent, PushEvent,
        RefChange, User,
    },
};

const SEPARATOR: &str = "⋅";

/// Logs a summary of every delivery until all senders are dropped.
pub async fn run(mut deliveries: UnboundedReceiver<Delivery>) {
    debug!("running...");

    loop {
        let delivery = match deliveries.recv().await {
            Some(delivery) => delivery,
            None => {
                info!("all channel senders were dropped, exiting receive loop");
                break;
            }
        };
        debug!(
            "received {} event, delivery {:?}",
            delivery.event.key(),
            delivery.request_id
        );

        match summarize(&delivery.event) {
            Some(message) => info!("{}", message),
            // event doesn't need to be announced
            None => trace!("nothing to announce for {}", delivery.event.key()),
        }
    }
}

/// One-line, human readable description of `event`.
pub fn summarize(event: &BitbucketEvent) -> Option<String> {
    let actor = event.actor().map_or_else(|| "someone".to_owned(), User::to_string);
    let place = event
        .repository()
        .map_or_else(String::new, |repo| format!("[{}] ", repo));

    let action = match event {
        BitbucketEvent::Push(event) => describe_push(event)?,
        BitbucketEvent::RepositoryModified(event) => match (&event.old, &event.new) {
            (Some(old), Some(new)) if old.full_name() != new.full_name() => {
                format!("moved {} to {}", old, new)
            }
            _ => "modified the repository".to_owned(),
        },
        BitbucketEvent::RepositoryForked(event) => {
            match event.repository.as_ref().and_then(|fork| fork.origin.as_ref()) {
                Some(origin) => format!("forked {}", origin),
                None => "forked a repository".to_owned(),
            }
        }
        BitbucketEvent::PullRequestOpened(event) => describe_pr("opened", event)?,
        BitbucketEvent::PullRequestMerged(event) => describe_pr("merged", event)?,
        BitbucketEvent::PullRequestDeclined(event) => describe_pr("declined", event)?,
        BitbucketEvent::PullRequestDeleted(event) => describe_pr("deleted", event)?,
        BitbucketEvent::PullRequestModified(event) => {
            let pr = event.pull_request.as_ref()?;
            let mut edited = Vec::new();
            if pr.title != event.previous_title {
                edited.push("title");
            }
            if pr.description != event.previous_description {
                edited.push("description");
            }
            let retargeted = match (&pr.to_ref, &event.previous_target) {
                (Some(to), Some(previous)) => to.id != previous.id,
                _ => false,
            };
            if retargeted {
                edited.push("target branch");
            }
            if edited.is_empty() {
                edited.push("details");
            }
            with_link(format!("edited {} of {}", edited.join(", "), pr), pr)
        }
        BitbucketEvent::PullRequestFromRefUpdated(event) => {
            let pr = event.pull_request.as_ref()?;
            with_link(format!("pushed to the source branch of {}", pr), pr)
        }
        BitbucketEvent::PullRequestReviewersUpdated(event) => {
            let pr = event.pull_request.as_ref()?;
            let mut changes = Vec::new();
            if !event.added_reviewers.is_empty() {
                changes.push(format!("added {}", join_users(&event.added_reviewers)));
            }
            if !event.removed_reviewers.is_empty() {
                changes.push(format!("removed {}", join_users(&event.removed_reviewers)));
            }
            if changes.is_empty() {
                return None;
            }
            with_link(format!("{} as reviewers of {}", changes.join(" and "), pr), pr)
        }
        BitbucketEvent::PullRequestApproved(event) => describe_review("approved", event)?,
        BitbucketEvent::PullRequestUnapproved(event) => describe_review("unapproved", event)?,
        BitbucketEvent::PullRequestNeedsWork(event) => {
            describe_review("marked as needing work", event)?
        }
    };

    Some(format!("{}{} {}", place, actor, action))
}

fn describe_push(event: &PushEvent) -> Option<String> {
    match event.changes.as_slice() {
        [] => None,
        [change] => Some(describe_ref_change(change)),
        changes => Some(format!("updated {} refs", changes.len())),
    }
}

fn describe_ref_change(change: &RefChange) -> String {
    let kind = change.r#ref.r#type.to_lowercase();
    let name = &change.r#ref.display_id;
    match change.r#type.as_str() {
        "ADD" => format!("created {} {}", kind, name),
        "DELETE" => format!("deleted {} {}", kind, name),
        _ => format!(
            "pushed to {} ({}..{})",
            name,
            short_hash(&change.from_hash),
            short_hash(&change.to_hash)
        ),
    }
}

fn describe_pr(action: &str, event: &PullRequestEvent) -> Option<String> {
    let pr = event.pull_request.as_ref()?;
    Some(with_link(format!("{} {}", action, pr), pr))
}

fn describe_review(action: &str, event: &PullRequestReviewerEvent) -> Option<String> {
    let pr = event.pull_request.as_ref()?;
    Some(with_link(format!("{} {}", action, pr), pr))
}

fn with_link(message: String, pr: &PullRequest) -> String {
    match pr.html_url() {
        Some(url) => format!("{} {} {}", message, SEPARATOR, url),
        None => message,
    }
}

fn join_users(users: &[User]) -> String {
    users
        .iter()
        .map(User::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::webhooks::decode;

    fn event(key: &str, payload: &str) -> BitbucketEvent {
        decode(key, payload.as_bytes()).unwrap()
    }

    #[test]
    fn push_summaries() {
        let push = event(
            "repo:refs_changed",
            include_str!("../tests/fixtures/repo_refs_changed.json"),
        );
        assert_eq!(
            summarize(&push).unwrap(),
            "[PROJ/repository] admin pushed to master (ecddabb..178864a)"
        );

        let tag = event(
            "repo:refs_changed",
            r#"{"actor": {"name": "admin"}, "changes": [{"ref": {"displayId": "v1.0", "type": "TAG"}, "type": "ADD"}]}"#,
        );
        assert_eq!(summarize(&tag).unwrap(), "admin created tag v1.0");

        let empty = event("repo:refs_changed", r#"{"changes": []}"#);
        assert_eq!(summarize(&empty), None);
    }

    #[test]
    fn pull_request_summaries() {
        let opened = event("pr:opened", include_str!("../tests/fixtures/pr_opened.json"));
        assert_eq!(
            summarize(&opened).unwrap(),
            "[PROJ/repository] admin opened PR #12: Add webhook receiver by admin"
        );

        let modified = event("pr:modified", include_str!("../tests/fixtures/pr_modified.json"));
        assert_eq!(
            summarize(&modified).unwrap(),
            "[PROJ/repository] admin edited title, description of PR #9: New title by admin \
             ⋅ http://bitbucket.example/projects/PROJ/repos/repository/pull-requests/9"
        );

        let reviewers = event(
            "pr:reviewer:updated",
            include_str!("../tests/fixtures/pr_reviewer_updated.json"),
        );
        assert_eq!(
            summarize(&reviewers).unwrap(),
            "admin added user and removed pirate as reviewers of PR #1: Basic changes by admin"
        );

        let approved = event(
            "pr:reviewer:approved",
            include_str!("../tests/fixtures/pr_reviewer_approved.json"),
        );
        assert_eq!(
            summarize(&approved).unwrap(),
            "user approved PR #5: Add cool things by admin"
        );
    }

    #[test]
    fn repository_summaries() {
        let forked = event("repo:forked", include_str!("../tests/fixtures/repo_forked.json"));
        assert_eq!(
            summarize(&forked).unwrap(),
            "[~ADMIN/repository] admin forked PROJ/repository"
        );

        let moved = event("repo:modified", include_str!("../tests/fixtures/repo_modified.json"));
        assert_eq!(
            summarize(&moved).unwrap(),
            "[PROJ/repository2] admin moved PROJ/repository to PROJ/repository2"
        );
    }

    #[test]
    fn pull_request_events_without_pull_request_are_skipped() {
        assert_eq!(summarize(&event("pr:merged", "{}")), None);
    }

    #[tokio::test]
    async fn run_stops_when_senders_are_dropped() {
        let (sender, receiver) = unbounded_channel();
        sender
            .send(Delivery {
                request_id: Some("delivery".to_owned()),
                event: event("pr:deleted", "{}"),
            })
            .unwrap();
        drop(sender);

        run(receiver).await;
    }
}
