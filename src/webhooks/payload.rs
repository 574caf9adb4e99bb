use thiserror::Error;
use tracing::trace;
use url::form_urlencoded;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Name of the form field holding the JSON payload when a webhook is configured to send
/// `application/x-www-form-urlencoded` bodies.
pub const PAYLOAD_FORM_PARAM: &str = "payload";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("webhook request has unsupported Content-Type {0:?}")]
    UnsupportedContentType(String),
}

/// Returns the JSON payload carried by `body`, whichever encoding the sender picked.
///
/// For form bodies a missing `payload` field yields an empty payload: decoding it later fails,
/// extraction itself does not.
pub fn extract(content_type: Option<&str>, body: &[u8]) -> Result<Vec<u8>, PayloadError> {
    match content_type {
        Some(CONTENT_TYPE_JSON) => Ok(body.to_vec()),
        Some(CONTENT_TYPE_FORM) => {
            // lenient: bad escapes pass through and invalid UTF-8 is replaced, the JSON decoder
            // rejects whatever that leaves
            let payload = form_urlencoded::parse(body)
                .find(|(name, _)| name == PAYLOAD_FORM_PARAM)
                .map(|(_, value)| value.into_owned().into_bytes());
            if payload.is_none() {
                trace!("form body has no `{}` field", PAYLOAD_FORM_PARAM);
            }
            Ok(payload.unwrap_or_default())
        }
        other => {
            trace!("content type `{:?}` isn't supported, stopping here...", other);
            Err(PayloadError::UnsupportedContentType(
                other.unwrap_or_default().to_owned(),
            ))
        }
    }
}
