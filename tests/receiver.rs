use rocket::{
    http::{ContentType, Header, Status},
    local::blocking::Client,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use stashhook::{
    server::{self, Delivery},
    webhooks::{
        signing::{sign, Algorithm},
        BitbucketEvent, WebhookSecret, WebhookValidator,
    },
};

const ENDPOINT: &str = "/api/webhooks/bitbucket";
const SECRET: &[u8] = b"topsecret";
const PUSH: &str = include_str!("fixtures/repo_refs_changed.json");
const PR_OPENED: &str = include_str!("fixtures/pr_opened.json");

fn receiver(validator: WebhookValidator) -> (Client, UnboundedReceiver<Delivery>) {
    let (sender, deliveries) = unbounded_channel();
    let client = Client::tracked(server::build(validator, sender)).expect("valid rocket instance");
    (client, deliveries)
}

fn signed_receiver() -> (Client, UnboundedReceiver<Delivery>) {
    receiver(WebhookValidator::new(WebhookSecret::new(SECRET)))
}

#[test]
fn signed_push_is_forwarded() {
    let (client, mut deliveries) = signed_receiver();

    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .header(Header::new("X-Event-Key", "repo:refs_changed"))
        .header(Header::new("X-Request-Id", "5a1e1f2c-delivery"))
        .header(Header::new(
            "X-Hub-Signature",
            sign(Algorithm::Sha1, PUSH.as_bytes(), SECRET),
        ))
        .body(PUSH)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let delivery = deliveries.try_recv().expect("event was forwarded");
    assert_eq!(delivery.request_id.as_deref(), Some("5a1e1f2c-delivery"));
    match delivery.event {
        BitbucketEvent::Push(push) => {
            assert_eq!(push.event_key, "repo:refs_changed");
            assert_eq!(push.changes.len(), 1);
        }
        other => panic!("expected a push event, got {:?}", other),
    }
}

#[test]
fn form_encoded_delivery() {
    let (client, mut deliveries) = signed_receiver();
    let body = format!(
        "payload={}",
        url::form_urlencoded::byte_serialize(PR_OPENED.as_bytes()).collect::<String>()
    );

    let response = client
        .post(ENDPOINT)
        .header(ContentType::Form)
        .header(Header::new("X-Event-Key", "pr:opened"))
        .header(Header::new(
            "X-Hub-Signature",
            sign(Algorithm::Sha256, body.as_bytes(), SECRET),
        ))
        .body(body)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let delivery = deliveries.try_recv().expect("event was forwarded");
    assert_eq!(delivery.request_id, None);
    assert!(matches!(delivery.event, BitbucketEvent::PullRequestOpened(_)));
}

#[test]
fn bad_signatures_are_unauthorized() {
    let (client, mut deliveries) = signed_receiver();

    for signature in [
        Some(sign(Algorithm::Sha1, PUSH.as_bytes(), b"not the secret")),
        Some("md5=deadbeef".to_owned()),
        Some("sha1".to_owned()),
        None,
    ] {
        let mut request = client
            .post(ENDPOINT)
            .header(ContentType::JSON)
            .header(Header::new("X-Event-Key", "repo:refs_changed"))
            .body(PUSH);
        if let Some(signature) = signature {
            request = request.header(Header::new("X-Hub-Signature", signature));
        }
        assert_eq!(request.dispatch().status(), Status::Unauthorized);
    }

    assert!(deliveries.try_recv().is_err());
}

#[test]
fn unsupported_content_type() {
    let (client, _deliveries) = signed_receiver();
    let response = client
        .post(ENDPOINT)
        .header(ContentType::Plain)
        .header(Header::new("X-Event-Key", "repo:refs_changed"))
        .header(Header::new(
            "X-Hub-Signature",
            sign(Algorithm::Sha1, PUSH.as_bytes(), SECRET),
        ))
        .body(PUSH)
        .dispatch();
    assert_eq!(response.status(), Status::UnsupportedMediaType);
}

#[test]
fn unknown_event_keys_are_acknowledged() {
    let (client, mut deliveries) = receiver(WebhookValidator::insecure_unsigned());
    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .header(Header::new("X-Event-Key", "pr:comment:added"))
        .body("{}")
        .dispatch();
    assert_eq!(response.status(), Status::Accepted);
    assert!(deliveries.try_recv().is_err());
}

#[test]
fn malformed_payloads_are_bad_requests() {
    let (client, mut deliveries) = receiver(WebhookValidator::insecure_unsigned());
    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .header(Header::new("X-Event-Key", "pr:opened"))
        .body(r#"{"pullRequest": "#)
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
    assert!(deliveries.try_recv().is_err());
}

#[test]
fn event_key_is_required() {
    let (client, _deliveries) = receiver(WebhookValidator::insecure_unsigned());
    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .body(PUSH)
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);
}

#[test]
fn unsigned_mode_accepts_unsigned_requests() {
    let (client, mut deliveries) = receiver(WebhookValidator::insecure_unsigned());
    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .header(Header::new("X-Event-Key", "repo:refs_changed"))
        .body(PUSH)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert!(deliveries.try_recv().is_ok());
}

#[test]
fn closed_channel_is_unavailable() {
    let (client, deliveries) = receiver(WebhookValidator::insecure_unsigned());
    drop(deliveries);

    let response = client
        .post(ENDPOINT)
        .header(ContentType::JSON)
        .header(Header::new("X-Event-Key", "pr:opened"))
        .body(PR_OPENED)
        .dispatch();
    assert_eq!(response.status(), Status::ServiceUnavailable);
}
