use std::{fs::File, io::BufReader, path::Path};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;

use crate::webhooks::{WebhookSecret, WebhookValidator};

#[derive(Debug, Default, Deserialize)]
pub struct ReceiverConfig {
    /// Secret configured on the Bitbucket Server webhook, used to check request signatures.
    #[serde(default)]
    pub webhook_secret: WebhookSecret,
    /// Accept unsigned requests when no secret is configured. Only meant for local development.
    #[serde(default)]
    pub insecure_skip_verification: bool,
}

impl ReceiverConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config_file =
            File::open(path).with_context(|| format!("couldn't open {}:", path.display()))?;
        serde_yaml::from_reader(BufReader::new(config_file)).context("couldn't parse config file")
    }

    /// Builds the validator for incoming requests, refusing to run unsigned unless explicitly
    /// told to.
    pub fn validator(&self) -> anyhow::Result<WebhookValidator> {
        if self.webhook_secret.is_empty() {
            if !self.insecure_skip_verification {
                bail!(
                    "no webhook_secret configured; set `insecure_skip_verification: true` to \
                     accept unsigned requests (local development only)"
                );
            }
            return Ok(WebhookValidator::insecure_unsigned());
        }

        if self.insecure_skip_verification {
            warn!("insecure_skip_verification is ignored because a webhook_secret is configured");
        }
        Ok(WebhookValidator::new(self.webhook_secret.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_enables_verification() {
        let config: ReceiverConfig = serde_yaml::from_str("webhook_secret: topsecret\n").unwrap();
        let validator = config.validator().unwrap();
        assert!(validator.verifies_signatures());
        assert!(!format!("{:?}", config).contains("topsecret"));
    }

    #[test]
    fn missing_secret_is_refused() {
        let config: ReceiverConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.validator().is_err());

        let config: ReceiverConfig = serde_yaml::from_str("webhook_secret: ''\n").unwrap();
        assert!(config.validator().is_err());
    }

    #[test]
    fn unsigned_mode_needs_opt_in() {
        let config: ReceiverConfig =
            serde_yaml::from_str("insecure_skip_verification: true\n").unwrap();
        assert!(!config.validator().unwrap().verifies_signatures());
    }

    #[test]
    fn secret_wins_over_opt_in() {
        let config: ReceiverConfig = serde_yaml::from_str(
            "webhook_secret: topsecret\ninsecure_skip_verification: true\n",
        )
        .unwrap();
        assert!(config.validator().unwrap().verifies_signatures());
    }
}
