//! PIN and biometric authentication.

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use authkit_vault::{CredentialSet, ProfileId, UserProfile};

use crate::client::{FlowKind, UserClient};
use crate::error::{AuthFailure, AuthKitError};
use crate::observer::{AuthenticationObserver, PinEntry};
use crate::platform::BiometricVerdict;
use crate::AuthKitResult;

impl UserClient {
    /// Authenticates `profile_id`, establishing an authorized session.
    ///
    /// A no-op when the profile is already authorized. When the profile has
    /// biometric unlock enrolled and the device currently supports it, the
    /// biometric prompt runs first; a denied or failed verdict falls back to
    /// the PIN prompt.
    ///
    /// # Errors
    ///
    /// [`AuthFailure::InvalidCredentials`] for unknown profiles and exhausted
    /// PIN attempts (which also wipes the stored grant),
    /// [`AuthFailure::Revoked`] when the server rejects the stored grant, and
    /// [`crate::AuthKitError::Cancelled`] when the user dismisses the prompt.
    pub async fn authenticate(
        &self,
        profile_id: &ProfileId,
        observer: &dyn AuthenticationObserver,
    ) -> AuthKitResult<UserProfile> {
        {
            let session = self.session.lock().await;
            if session.is_authorized_for(profile_id) {
                if let Some(profile) = session.profile().cloned() {
                    return Ok(profile);
                }
            }
        }
        self.run_authentication(profile_id, observer).await
    }

    /// Re-runs the authentication flow even when already authorized, for
    /// step-up confirmation of sensitive actions.
    ///
    /// # Errors
    ///
    /// Same as [`Self::authenticate`].
    pub async fn reauthenticate(
        &self,
        profile_id: &ProfileId,
        observer: &dyn AuthenticationObserver,
    ) -> AuthKitResult<UserProfile> {
        self.run_authentication(profile_id, observer).await
    }

    /// Ends the authorized session, dropping the access token. The refresh
    /// token and client credentials stay in the vault, so the next
    /// authentication can use the silent refresh grant.
    ///
    /// # Errors
    ///
    /// [`crate::PreconditionFailure::NotAuthenticated`] when no user is
    /// signed in.
    pub async fn logout(&self) -> AuthKitResult<UserProfile> {
        let mut session = self.session.lock().await;
        session
            .invalidate()
            .ok_or_else(|| crate::PreconditionFailure::NotAuthenticated.into())
    }

    /// Wipes the stored refresh token for `profile_id` and resets its PIN
    /// attempt counter. Ends the session when the profile is signed in; the
    /// next authentication starts from client credentials.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthKitError::Storage`] when the vault write fails.
    pub async fn clear_tokens(&self, profile_id: &ProfileId) -> AuthKitResult<()> {
        self.vault.update(profile_id, |record| {
            record.refresh_token = None;
            record.failed_pin_attempts = 0;
        })?;
        let mut session = self.session.lock().await;
        if session.profile().is_some_and(|p| p.id == *profile_id) {
            session.invalidate();
        }
        Ok(())
    }

    /// Wipes the dynamic OAuth client for `profile_id` along with the stored
    /// refresh token and attempt counter. The profile and its PIN survive;
    /// the next authentication registers a fresh client with the original
    /// scopes before requesting tokens. Ends the session when the profile is
    /// signed in.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthKitError::Storage`] when the vault write fails.
    pub async fn clear_credentials(
        &self,
        profile_id: &ProfileId,
    ) -> AuthKitResult<()> {
        self.vault.update(profile_id, |record| {
            record.client_id.clear();
            record.client_secret.clear();
            record.refresh_token = None;
            record.failed_pin_attempts = 0;
        })?;
        let mut session = self.session.lock().await;
        if session.profile().is_some_and(|p| p.id == *profile_id) {
            session.invalidate();
        }
        Ok(())
    }

    async fn run_authentication(
        &self,
        profile_id: &ProfileId,
        observer: &dyn AuthenticationObserver,
    ) -> AuthKitResult<UserProfile> {
        let _guard = self.begin_flow(Some(profile_id), FlowKind::Authentication)?;

        let profile = self
            .vault
            .profile(profile_id)?
            .ok_or(AuthFailure::InvalidCredentials)?;
        let credentials = self
            .vault
            .retrieve(profile_id)?
            .ok_or(AuthFailure::InvalidCredentials)?;

        self.session.lock().await.begin_authentication();
        match self.drive_authentication(&profile, credentials, observer).await {
            Ok(()) => Ok(profile),
            Err(err) => {
                self.session.lock().await.fail_authentication();
                Err(err)
            }
        }
    }

    async fn drive_authentication(
        &self,
        profile: &UserProfile,
        mut credentials: CredentialSet,
        observer: &dyn AuthenticationObserver,
    ) -> AuthKitResult<()> {
        let mut unlocked = false;
        if credentials.biometric_key.is_some()
            && self.biometric_unavailable_reason().is_none()
        {
            match self.biometric.authenticate().await {
                BiometricVerdict::Granted => unlocked = true,
                BiometricVerdict::Denied | BiometricVerdict::Failed => {
                    info!(profile = %profile.id, "biometric unlock refused, falling back to pin");
                }
            }
        }
        if !unlocked {
            self.verify_pin(profile, &credentials, observer).await?;
        }

        if credentials.client_id.is_empty() {
            // The dynamic client was cleared; register a fresh one with the
            // scopes from the original registration.
            let (client_id, client_secret) =
                self.tokens.register_client(&credentials.scopes).await?;
            credentials.client_id = client_id.clone();
            credentials.client_secret = client_secret.clone();
            self.vault.update(&profile.id, move |record| {
                record.client_id = client_id;
                record.client_secret = client_secret;
            })?;
            info!(profile = %profile.id, "dynamic client re-registered");
        }

        let token = match self.tokens.acquire(&credentials).await {
            Ok((token, rotated)) => {
                if let Some(refresh_token) = rotated {
                    self.vault.update(&profile.id, |record| {
                        record.refresh_token = Some(refresh_token);
                    })?;
                }
                token
            }
            Err(err) => {
                if matches!(err, AuthKitError::Auth(AuthFailure::Revoked)) {
                    // The server no longer honors the grant; drop it so the
                    // next attempt starts from client credentials.
                    self.vault.update(&profile.id, |record| {
                        record.refresh_token = None;
                    })?;
                }
                return Err(err);
            }
        };

        self.session
            .lock()
            .await
            .authorize(profile.clone(), token);
        info!(profile = %profile.id, "authentication succeeded");
        Ok(())
    }

    /// Runs the PIN prompt loop against the stored verifier, persisting the
    /// failure counter across attempts and process restarts. Exhausting the
    /// attempt budget wipes the stored grant.
    async fn verify_pin(
        &self,
        profile: &UserProfile,
        credentials: &CredentialSet,
        observer: &dyn AuthenticationObserver,
    ) -> AuthKitResult<()> {
        let max_attempts = self.config.max_pin_attempts;
        let mut failed = credentials.failed_pin_attempts;

        while failed < max_attempts {
            let remaining = max_attempts - failed;
            let entry = observer.provide_pin(profile, remaining).await;
            let pin = match entry {
                PinEntry::Cancelled => return Err(AuthKitError::Cancelled),
                PinEntry::Entered(pin) => pin,
            };

            if credentials.pin_verifier.matches(pin.expose_secret()) {
                self.vault.update(&profile.id, |record| {
                    record.failed_pin_attempts = 0;
                })?;
                return Ok(());
            }

            failed += 1;
            self.vault.update(&profile.id, |record| {
                record.failed_pin_attempts = failed;
            })?;
            warn!(profile = %profile.id, failed, "pin attempt failed");
        }

        self.wipe_grant(&profile.id).await?;
        Err(AuthFailure::InvalidCredentials.into())
    }

    /// Checks `pin` against the stored verifier for `profile_id`, counting a
    /// mismatch against the same persisted attempt budget as the login
    /// prompt. Exhausting the budget wipes the stored grant.
    pub(crate) async fn confirm_pin(
        &self,
        profile_id: &ProfileId,
        pin: &SecretString,
    ) -> AuthKitResult<()> {
        let credentials = self
            .vault
            .retrieve(profile_id)?
            .ok_or(AuthFailure::InvalidCredentials)?;

        if credentials.pin_verifier.matches(pin.expose_secret()) {
            if credentials.failed_pin_attempts != 0 {
                self.vault.update(profile_id, |record| {
                    record.failed_pin_attempts = 0;
                })?;
            }
            return Ok(());
        }

        let failed = credentials.failed_pin_attempts + 1;
        if failed >= self.config.max_pin_attempts {
            self.wipe_grant(profile_id).await?;
        } else {
            self.vault.update(profile_id, |record| {
                record.failed_pin_attempts = failed;
            })?;
            warn!(profile = %profile_id, failed, "pin confirmation failed");
        }
        Err(AuthFailure::InvalidCredentials.into())
    }

    /// Drops the stored refresh token and resets the attempt counter once
    /// the attempt budget is exhausted. Ends the session when `profile_id`
    /// is the signed-in profile.
    async fn wipe_grant(&self, profile_id: &ProfileId) -> AuthKitResult<()> {
        self.vault.update(profile_id, |record| {
            record.refresh_token = None;
            record.failed_pin_attempts = 0;
        })?;
        let mut session = self.session.lock().await;
        if session.profile().is_some_and(|p| p.id == *profile_id) {
            session.invalidate();
        }
        warn!(profile = %profile_id, "pin attempts exhausted, stored grant wiped");
        Ok(())
    }
}
