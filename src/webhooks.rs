//! Ingestion of Bitbucket Server webhook requests.
//!
//! A request goes through [`WebhookValidator::validate`], which returns the authenticated JSON
//! payload, and then through [`events::decode`] with the value of the [`X_EVENT_KEY`] header.
//!
//! Bitbucket Server documents the headers and payloads at
//! <https://confluence.atlassian.com/bitbucketserver/event-payload-938025882.html>.

use std::{fmt, io::Read};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace, warn};

pub mod events;
pub mod payload;
pub mod signing;

pub use events::{decode, BitbucketEvent, DecodeError, EventKey};
pub use payload::PayloadError;
pub use signing::{SignatureError, X_HUB_SIGNATURE};

pub const CONTENT_TYPE: &str = "Content-Type";
/// Header naming the event, e.g. `pr:opened`.
pub const X_EVENT_KEY: &str = "X-Event-Key";
/// Header carrying a unique id for each delivery, useful to deduplicate redeliveries.
pub const X_REQUEST_ID: &str = "X-Request-Id";

/// Read access to the headers of an inbound request, whatever HTTP stack received it.
///
/// Lookups are case-insensitive and return the first value when a header is repeated.
pub trait HookHeaders {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HookHeaders for [(&str, &str)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

impl<const N: usize> HookHeaders for [(&str, &str); N] {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

impl HookHeaders for rocket::http::HeaderMap<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get_one(name)
    }
}

/// Returns the event key of the request, without checking it.
pub fn event_key<H: HookHeaders + ?Sized>(headers: &H) -> Option<&str> {
    headers.header(X_EVENT_KEY)
}

/// Returns the unique id of this delivery, without checking it.
pub fn request_id<H: HookHeaders + ?Sized>(headers: &H) -> Option<&str> {
    headers.header(X_REQUEST_ID)
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("couldn't read request body")]
    Body(#[from] std::io::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// The secret shared with Bitbucket Server when the webhook was set up.
#[derive(Clone, Default, Deserialize)]
#[serde(from = "String")]
pub struct WebhookSecret(Vec<u8>);

impl From<String> for WebhookSecret {
    fn from(secret: String) -> Self {
        Self(secret.into_bytes())
    }
}

impl WebhookSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("WebhookSecret(<empty>)")
        } else {
            f.write_str("WebhookSecret(<redacted>)")
        }
    }
}

/// Authenticates webhook requests and extracts their payload.
///
/// The validator holds no mutable state and can be shared between concurrent requests.
#[derive(Debug, Clone)]
pub struct WebhookValidator {
    secret: WebhookSecret,
}

impl WebhookValidator {
    /// Creates a validator checking signatures against `secret`.
    ///
    /// An empty secret disables signature checks: see [`WebhookValidator::insecure_unsigned`].
    pub fn new(secret: WebhookSecret) -> Self {
        if secret.is_empty() {
            warn!("webhook secret is empty, request signatures WILL NOT be verified");
        }
        Self { secret }
    }

    /// Creates a validator accepting any request, signed or not.
    ///
    /// **Never use this in production**: anyone able to reach the endpoint can forge events. It
    /// only exists for local development against a Bitbucket instance without a webhook secret.
    pub fn insecure_unsigned() -> Self {
        Self::new(WebhookSecret::default())
    }

    pub fn verifies_signatures(&self) -> bool {
        !self.secret.is_empty()
    }

    /// Reads `body` once, extracts its JSON payload and checks the request signature.
    ///
    /// The signature covers the body as it was sent, which is what Bitbucket Server signs: for
    /// form-encoded requests this is the encoded form, not the extracted payload. A form request
    /// signed over the bare JSON is rejected.
    pub fn validate<H, R>(&self, headers: &H, mut body: R) -> Result<Vec<u8>, ValidationError>
    where
        H: HookHeaders + ?Sized,
        R: Read,
    {
        let mut raw = Vec::new();
        body.read_to_end(&mut raw)?;
        trace!("read {} bytes of webhook body", raw.len());

        let payload = payload::extract(headers.header(CONTENT_TYPE), &raw)?;

        if self.verifies_signatures() {
            signing::verify(headers.header(X_HUB_SIGNATURE), &raw, self.secret.as_bytes())?;
            trace!("validated webhook signature");
        } else {
            debug!("no webhook secret configured, skipping signature check");
        }

        Ok(payload)
    }
}
