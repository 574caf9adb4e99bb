use std::{convert::Infallible, io};

use anyhow::anyhow;
use rocket::{
    data::{self, ByteUnit, FromData},
    http::Status,
    outcome::Outcome,
    request::{self, FromRequest},
    routes, Build, Data, Request, Rocket, State,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, trace, warn};

use crate::webhooks::{
    self, decode, BitbucketEvent, ValidationError, WebhookValidator, X_EVENT_KEY,
};

/// A decoded event, along with the delivery id Bitbucket Server attached to it.
#[derive(Debug)]
pub struct Delivery {
    pub request_id: Option<String>,
    pub event: BitbucketEvent,
}

pub struct EventSender(pub UnboundedSender<Delivery>);

/// Builds the receiver, forwarding every decoded event to `sender`.
pub fn build(validator: WebhookValidator, sender: UnboundedSender<Delivery>) -> Rocket<Build> {
    rocket::build()
        .mount("/", routes![bitbucket_webhook])
        .manage(validator)
        .manage(EventSender(sender))
}

#[rocket::post("/api/webhooks/bitbucket", data = "<payload>")]
pub fn bitbucket_webhook(
    event_key: EventKeyHeader,
    request_id: RequestId,
    payload: ValidatedPayload,
    sender: &State<EventSender>,
) -> (Status, &'static str) {
    let event = match decode(&event_key.0, &payload.0) {
        Ok(event) => event,
        Err(e) if e.is_recoverable() => {
            info!("ignoring delivery {:?}: {}", request_id.0, e);
            return (Status::Accepted, "ignored");
        }
        Err(e) => {
            warn!("rejecting delivery {:?}: {}", request_id.0, e);
            return (Status::BadRequest, "malformed payload");
        }
    };

    info!("received {} event (delivery {:?})", event.key(), request_id.0);
    let delivery = Delivery {
        request_id: request_id.0,
        event,
    };
    if sender.0.send(delivery).is_err() {
        error!("event channel was closed / dropped, can't forward event");
        return (Status::ServiceUnavailable, "shutting down");
    }

    (Status::Ok, "OK")
}

/// Value of the `X-Event-Key` header. Requests must carry exactly one.
#[derive(Debug)]
pub struct EventKeyHeader(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for EventKeyHeader {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        if request.headers().get(X_EVENT_KEY).count() > 1 {
            return Outcome::Error((
                Status::BadRequest,
                anyhow!("request header needs exactly one event key"),
            ));
        }

        match webhooks::event_key(request.headers()) {
            Some(key) => Outcome::Success(EventKeyHeader(key.to_owned())),
            None => {
                trace!("couldn't locate {} header", X_EVENT_KEY);
                Outcome::Error((Status::BadRequest, anyhow!("request has no event key")))
            }
        }
    }
}

/// Value of the `X-Request-Id` header, if any.
#[derive(Debug)]
pub struct RequestId(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        Outcome::Success(RequestId(
            webhooks::request_id(request.headers()).map(str::to_owned),
        ))
    }
}

/// JSON payload of a request that went through [`WebhookValidator::validate`].
pub struct ValidatedPayload(pub Vec<u8>);

const LIMIT: ByteUnit = ByteUnit::Mebibyte(1);

fn validation_status(err: &ValidationError) -> Status {
    match err {
        ValidationError::Body(_) => Status::BadRequest,
        ValidationError::Payload(_) => Status::UnsupportedMediaType,
        ValidationError::Signature(_) => Status::Unauthorized,
    }
}

#[rocket::async_trait]
impl<'r> FromData<'r> for ValidatedPayload {
    type Error = anyhow::Error;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        trace!("received payload on Bitbucket webhook endpoint: {:?}", request);

        let validator = match request.rocket().state::<WebhookValidator>() {
            Some(validator) => validator,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    anyhow!("no webhook validator is managed"),
                ))
            }
        };

        let size_limit = request.limits().get("json").unwrap_or(LIMIT);
        let content = match data.open(size_limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                let eof = io::ErrorKind::UnexpectedEof;
                trace!("payload was too big");
                return Outcome::Error((
                    Status::PayloadTooLarge,
                    io::Error::new(eof, "data limit exceeded").into(),
                ));
            }
            Err(e) => return Outcome::Error((Status::BadRequest, e.into())),
        };

        match validator.validate(request.headers(), content.as_slice()) {
            Ok(payload) => {
                trace!("validated Bitbucket payload");
                Outcome::Success(ValidatedPayload(payload))
            }
            Err(e) => {
                warn!("webhook validation failed, stopping here: {}", e);
                Outcome::Error((validation_status(&e), e.into()))
            }
        }
    }
}
