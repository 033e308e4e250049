//! Push-based mobile authentication.

use base64::prelude::{Engine, BASE64_STANDARD};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::Deserialize;
use tracing::{debug, info};

use authkit_vault::ProfileId;

use crate::client::{FlowKind, UserClient};
use crate::error::{AuthKitError, PreconditionFailure};
use crate::observer::{ChallengeDecision, ChallengeMessage, MobileAuthDelegate};
use crate::AuthKitResult;

/// Key under which this SDK's payload nests inside a push notification.
const ENVELOPE_KEY: &str = "authkit";

/// Expected length of the shared challenge key.
const CHALLENGE_KEY_LEN: usize = 32;

/// XChaCha20-Poly1305 nonce length prefixing every challenge payload.
const NONCE_LEN: usize = 24;

#[derive(Deserialize)]
struct PushEnvelope {
    transaction_id: String,
    profile_id: String,
}

#[derive(Deserialize)]
struct EnrollmentResponse {
    challenge_key: String,
}

#[derive(Deserialize)]
struct ChallengePayload {
    payload: String,
}

impl UserClient {
    /// Enrolls the signed-in profile for push-based mobile authentication.
    ///
    /// Requires a stored device push token and an authorized session. The
    /// server answers with a shared challenge key, which is persisted next to
    /// the credential set.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::NoPushToken`] without a stored push token,
    /// [`PreconditionFailure::NotAuthenticated`] without an authorized
    /// session, and network or storage errors from the exchange.
    pub async fn enroll_mobile_auth(&self) -> AuthKitResult<()> {
        let (profile, push_token, authorization) = {
            let session = self.session.lock().await;
            let push_token = session
                .push_token()
                .cloned()
                .ok_or(PreconditionFailure::NoPushToken)?;
            let profile = session
                .profile()
                .cloned()
                .ok_or(PreconditionFailure::NotAuthenticated)?;
            let authorization = session
                .authorization_header()
                .ok_or(PreconditionFailure::NotAuthenticated)?;
            (profile, push_token, authorization)
        };
        let _guard =
            self.begin_flow(Some(&profile.id), FlowKind::MobileAuthEnrollment)?;

        let url = self.config.endpoint("mobile-auth/enroll");
        let builder = self
            .http
            .builder(reqwest::Method::POST, &url)
            .header(reqwest::header::AUTHORIZATION, &authorization)
            .json(&serde_json::json!({
                "profile_id": profile.id.as_str(),
                "push_token": push_token,
            }));
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(crate::NetworkError::ServerError { url, status }.into());
        }
        let enrollment: EnrollmentResponse = response.json().await.map_err(|err| {
            AuthKitError::Serialization(format!(
                "malformed enrollment response: {err}"
            ))
        })?;

        let key = BASE64_STANDARD
            .decode(&enrollment.challenge_key)
            .map_err(|err| {
                AuthKitError::Serialization(format!("invalid challenge key: {err}"))
            })?;
        if key.len() != CHALLENGE_KEY_LEN {
            return Err(AuthKitError::Serialization(format!(
                "challenge key must be {CHALLENGE_KEY_LEN} bytes, got {}",
                key.len()
            )));
        }
        self.vault.update(&profile.id, move |record| {
            record.mobile_auth_key = Some(key);
        })?;

        info!(profile = %profile.id, "mobile authentication enrolled");
        Ok(())
    }

    /// Handles an incoming push notification payload.
    ///
    /// Returns `Ok(false)` without any network interaction when the payload
    /// does not carry this SDK's envelope; hosts route all notifications here
    /// and forward unclaimed ones elsewhere. For claimed notifications the
    /// pending challenge is fetched, decrypted with the enrolled challenge
    /// key, presented to the delegate, and the verdict is sent back.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::MobileAuthNotEnrolled`] when the named profile
    /// has no challenge key, serialization errors for undecryptable or
    /// mismatched challenges, and network errors from the exchange.
    pub async fn handle_push_notification(
        &self,
        payload: &serde_json::Value,
        delegate: &dyn MobileAuthDelegate,
    ) -> AuthKitResult<bool> {
        let Some(raw) = payload.get(ENVELOPE_KEY) else {
            return Ok(false);
        };
        let Ok(envelope) = serde_json::from_value::<PushEnvelope>(raw.clone()) else {
            debug!("push notification envelope is malformed, ignoring");
            return Ok(false);
        };

        let profile_id = ProfileId::from(envelope.profile_id);
        let credentials = self
            .vault
            .retrieve(&profile_id)?
            .ok_or(PreconditionFailure::MobileAuthNotEnrolled)?;
        let Some(key) = credentials.mobile_auth_key.clone() else {
            return Err(PreconditionFailure::MobileAuthNotEnrolled.into());
        };

        let challenge_url = self.config.endpoint(&format!(
            "mobile-auth/challenges/{}",
            envelope.transaction_id
        ));
        let builder = self
            .http
            .builder(reqwest::Method::GET, &challenge_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret));
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(crate::NetworkError::ServerError {
                url: challenge_url,
                status,
            }
            .into());
        }
        let sealed: ChallengePayload = response.json().await.map_err(|err| {
            AuthKitError::Serialization(format!("malformed challenge payload: {err}"))
        })?;

        let challenge =
            decrypt_challenge(&key, &envelope.transaction_id, &sealed.payload)?;
        if challenge.transaction_id != envelope.transaction_id {
            return Err(AuthKitError::Serialization(
                "challenge transaction mismatch".to_string(),
            ));
        }

        let decision = delegate.review_challenge(&challenge).await;
        let approved = decision == ChallengeDecision::Approve;

        let reply_url = self.config.endpoint(&format!(
            "mobile-auth/challenges/{}/reply",
            envelope.transaction_id
        ));
        let builder = self
            .http
            .builder(reqwest::Method::POST, &reply_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .json(&serde_json::json!({ "approved": approved }));
        let response = self.http.send(builder).await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(crate::NetworkError::ServerError {
                url: reply_url,
                status,
            }
            .into());
        }

        info!(
            transaction = %envelope.transaction_id,
            approved,
            "mobile authentication challenge answered"
        );
        Ok(true)
    }
}

/// Decrypts a base64 `nonce || ciphertext` challenge payload. The transaction
/// id is bound as associated data, so a payload replayed under another
/// transaction fails authentication.
fn decrypt_challenge(
    key: &[u8],
    transaction_id: &str,
    payload: &str,
) -> AuthKitResult<ChallengeMessage> {
    let sealed = BASE64_STANDARD.decode(payload).map_err(|err| {
        AuthKitError::Serialization(format!("invalid challenge encoding: {err}"))
    })?;
    if sealed.len() <= NONCE_LEN {
        return Err(AuthKitError::Serialization(
            "challenge payload too short".to_string(),
        ));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
        AuthKitError::Serialization("invalid challenge key length".to_string())
    })?;
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: transaction_id.as_bytes(),
            },
        )
        .map_err(|_| {
            AuthKitError::Serialization(
                "challenge decryption failed".to_string(),
            )
        })?;

    serde_json::from_slice(&plaintext).map_err(|err| {
        AuthKitError::Serialization(format!("malformed challenge message: {err}"))
    })
}
