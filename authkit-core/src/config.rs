//! Client configuration.

use std::collections::HashSet;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::AuthKitError;
use crate::AuthKitResult;

/// PIN policy constraints, immutable after client construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinPolicyConfig {
    /// Minimum PIN length.
    pub min_length: u32,
    /// Maximum number of times one digit may occur in a PIN.
    pub max_similar_digits: u32,
    /// Rejects fully ascending/descending digit sequences.
    pub disallow_sequences: bool,
    /// Exact PIN values that are never accepted.
    #[serde(default)]
    pub blacklist: HashSet<String>,
}

impl Default for PinPolicyConfig {
    fn default() -> Self {
        Self {
            min_length: 5,
            max_similar_digits: 3,
            disallow_sequences: true,
            blacklist: HashSet::new(),
        }
    }
}

/// Static client configuration, loaded once before building the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the token server.
    pub base_url: String,
    /// Base URL of the resource gateway.
    pub resource_base_url: String,
    /// Redirect URL completing browser-based authentication callbacks. The
    /// callback's scheme and host must match this value.
    pub redirect_url: String,
    /// Consecutive failed PIN entries tolerated before the stored grant is
    /// wiped.
    #[serde(default = "default_max_pin_attempts")]
    pub max_pin_attempts: u32,
    /// Remote feature flag gating biometric enrollment.
    #[serde(default)]
    pub biometric_enabled: bool,
    /// Minimum OS version (host-defined scale) required for biometric
    /// enrollment.
    #[serde(default)]
    pub min_os_version: u32,
    /// PIN policy constraints.
    #[serde(default)]
    pub pin_policy: PinPolicyConfig,
}

const fn default_max_pin_attempts() -> u32 {
    3
}

impl ClientConfig {
    /// Parses and validates a configuration from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Configuration`] if the JSON is malformed or a
    /// URL is invalid.
    pub fn from_json(json: &str) -> AuthKitResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|err| {
            AuthKitError::Configuration(format!("invalid config json: {err}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates URL fields and limits.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Configuration`] describing the first invalid
    /// field.
    pub fn validate(&self) -> AuthKitResult<()> {
        parse_url("base_url", &self.base_url)?;
        parse_url("resource_base_url", &self.resource_base_url)?;
        let redirect = parse_url("redirect_url", &self.redirect_url)?;
        if redirect.host_str().is_none() {
            return Err(AuthKitError::Configuration(
                "redirect_url must carry a host".to_string(),
            ));
        }
        if self.max_pin_attempts == 0 {
            return Err(AuthKitError::Configuration(
                "max_pin_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// True if `url` matches the configured redirect URL's scheme and host.
    #[must_use]
    pub(crate) fn redirect_matches(&self, url: &Url) -> bool {
        // redirect_url is validated at construction time.
        let Ok(expected) = Url::parse(&self.redirect_url) else {
            return false;
        };
        url.scheme() == expected.scheme() && url.host_str() == expected.host_str()
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn parse_url(field: &str, value: &str) -> AuthKitResult<Url> {
    Url::parse(value).map_err(|err| {
        AuthKitError::Configuration(format!("invalid {field} \"{value}\": {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_applies_defaults() {
        let config = ClientConfig::from_json(
            r#"{
                "base_url": "https://token.example.com",
                "resource_base_url": "https://api.example.com",
                "redirect_url": "demo://auth.example.com"
            }"#,
        )
        .expect("valid config");
        assert_eq!(config.max_pin_attempts, 3);
        assert_eq!(config.pin_policy.min_length, 5);
        assert!(!config.biometric_enabled);
    }

    #[test]
    fn from_json_rejects_invalid_urls() {
        let result = ClientConfig::from_json(
            r#"{
                "base_url": "not a url",
                "resource_base_url": "https://api.example.com",
                "redirect_url": "demo://auth.example.com"
            }"#,
        );
        assert!(matches!(result, Err(AuthKitError::Configuration(_))));
    }

    #[test]
    fn redirect_matching_compares_scheme_and_host() {
        let config = ClientConfig::from_json(
            r#"{
                "base_url": "https://token.example.com",
                "resource_base_url": "https://api.example.com",
                "redirect_url": "demo://auth.example.com"
            }"#,
        )
        .expect("valid config");

        let matching =
            Url::parse("demo://auth.example.com/callback?code=abc").expect("url");
        let wrong_scheme =
            Url::parse("https://auth.example.com/callback").expect("url");
        let wrong_host = Url::parse("demo://evil.example.com/callback").expect("url");
        assert!(config.redirect_matches(&matching));
        assert!(!config.redirect_matches(&wrong_scheme));
        assert!(!config.redirect_matches(&wrong_host));
    }

    #[test]
    fn endpoint_joins_without_duplicate_slashes() {
        let config = ClientConfig {
            base_url: "https://token.example.com/".to_string(),
            resource_base_url: "https://api.example.com".to_string(),
            redirect_url: "demo://auth.example.com".to_string(),
            max_pin_attempts: 3,
            biometric_enabled: false,
            min_os_version: 0,
            pin_policy: PinPolicyConfig::default(),
        };
        assert_eq!(
            config.endpoint("oauth/token"),
            "https://token.example.com/oauth/token"
        );
    }
}
