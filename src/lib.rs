//! Receives Bitbucket Server webhooks: signature checks, payload extraction and typed events.

pub mod announce;
pub mod config;
pub mod server;
pub(crate) mod utils;
pub mod webhooks;
