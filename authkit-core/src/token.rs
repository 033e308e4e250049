//! Token lifecycle: access tokens, authorization state, and the OAuth-style
//! exchanges against the token server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use authkit_vault::CredentialSet;

use crate::config::ClientConfig;
use crate::error::{AuthFailure, AuthKitError, NetworkError};
use crate::http_request::HttpClient;
use crate::AuthKitResult;

/// Authorization state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthorizationState {
    /// No access token is held.
    Unauthenticated,
    /// An authentication flow is running.
    Authenticating,
    /// A non-expired access token is held.
    Authorized,
    /// The held access token has expired.
    Expired,
}

/// A short-lived access token with its expiry.
pub struct AccessToken {
    value: SecretString,
    expires_at: Instant,
}

impl AccessToken {
    pub(crate) fn new(value: String, expires_in: Duration) -> Self {
        Self {
            value: SecretString::from(value),
            expires_at: Instant::now() + expires_in,
        }
    }

    /// True once the token has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// The raw token value.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.value
    }

    /// `Authorization` header value carrying this token.
    pub(crate) fn header_value(&self) -> String {
        format!("Bearer {}", self.value.expose_secret())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

const fn default_expires_in() -> u64 {
    300
}

#[derive(Deserialize)]
struct ClientRegistrationResponse {
    client_id: String,
    client_secret: String,
}

/// Performs token-server exchanges: dynamic client registration, token
/// grants, code exchange, and revocation.
#[derive(Clone)]
pub(crate) struct TokenManager {
    http: Arc<HttpClient>,
    config: Arc<ClientConfig>,
}

impl TokenManager {
    pub(crate) fn new(http: Arc<HttpClient>, config: Arc<ClientConfig>) -> Self {
        Self { http, config }
    }

    /// Registers a new dynamic client for the requested scopes.
    pub(crate) async fn register_client(
        &self,
        scopes: &[String],
    ) -> AuthKitResult<(String, String)> {
        let url = self.config.endpoint("oauth/clients");
        let builder = self
            .http
            .builder(reqwest::Method::POST, &url)
            .json(&serde_json::json!({ "scopes": scopes }));
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(grant_rejection(&url, status));
        }
        let registration: ClientRegistrationResponse =
            response.json().await.map_err(|err| {
                AuthKitError::Serialization(format!(
                    "malformed client registration response: {err}"
                ))
            })?;
        debug!(client_id = %registration.client_id, "dynamic client registered");
        Ok((registration.client_id, registration.client_secret))
    }

    /// Obtains an access token for `credentials`.
    ///
    /// Uses the refresh-token grant when a refresh token is stored (silent
    /// refresh) and the client-credentials grant otherwise. Returns the
    /// access token together with any rotated refresh token.
    pub(crate) async fn acquire(
        &self,
        credentials: &CredentialSet,
    ) -> AuthKitResult<(AccessToken, Option<String>)> {
        let form: Vec<(&str, &str)> = match credentials.refresh_token.as_deref() {
            Some(refresh_token) => vec![
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            None => vec![("grant_type", "client_credentials")],
        };
        let silent = credentials.refresh_token.is_some();
        let rejection = if silent {
            AuthFailure::Revoked
        } else {
            AuthFailure::InvalidCredentials
        };
        self.token_request(credentials, &form, rejection).await
    }

    /// Exchanges a browser-redirect authorization code for tokens.
    pub(crate) async fn exchange_code(
        &self,
        credentials: &CredentialSet,
        code: &str,
    ) -> AuthKitResult<(AccessToken, Option<String>)> {
        let form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_url),
        ];
        self.token_request(credentials, &form, AuthFailure::InvalidCredentials)
            .await
    }

    /// Revokes the stored refresh token server-side. A profile without a
    /// refresh token has nothing to revoke.
    pub(crate) async fn revoke(
        &self,
        credentials: &CredentialSet,
    ) -> AuthKitResult<()> {
        let Some(refresh_token) = credentials.refresh_token.as_deref() else {
            return Ok(());
        };
        let url = self.config.endpoint("oauth/revoke");
        let builder = self
            .http
            .builder(reqwest::Method::POST, &url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(&[("token", refresh_token)]);
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(grant_rejection(&url, status))
        }
    }

    async fn token_request(
        &self,
        credentials: &CredentialSet,
        form: &[(&str, &str)],
        rejection: AuthFailure,
    ) -> AuthKitResult<(AccessToken, Option<String>)> {
        let url = self.config.endpoint("oauth/token");
        let builder = self
            .http
            .builder(reqwest::Method::POST, &url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .form(form);
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if status == 400 || status == 401 || status == 403 {
            debug!(%url, status, "token grant rejected");
            return Err(rejection.into());
        }
        if !(200..300).contains(&status) {
            return Err(NetworkError::ServerError { url, status }.into());
        }
        let token: TokenResponse = response.json().await.map_err(|err| {
            AuthKitError::Serialization(format!("malformed token response: {err}"))
        })?;
        Ok((
            AccessToken::new(
                token.access_token,
                Duration::from_secs(token.expires_in),
            ),
            token.refresh_token,
        ))
    }
}

fn grant_rejection(url: &str, status: u16) -> AuthKitError {
    if status == 400 || status == 401 || status == 403 {
        AuthFailure::InvalidCredentials.into()
    } else {
        NetworkError::ServerError {
            url: url.to_string(),
            status,
        }
        .into()
    }
}
