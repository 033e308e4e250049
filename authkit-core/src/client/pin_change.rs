//! PIN change.

use secrecy::ExposeSecret;
use tracing::info;

use authkit_vault::PinVerifier;

use crate::client::{collect_valid_pin, FlowKind, UserClient};
use crate::error::{AuthKitError, PreconditionFailure};
use crate::observer::{ChangePinObserver, PinEntry};
use crate::AuthKitResult;

impl UserClient {
    /// Changes the signed-in profile's PIN.
    ///
    /// Requires an authenticated session backed by a stored refresh token.
    /// The user confirms the current PIN, then chooses a new one subject to
    /// the PIN policy; the verifier is replaced in a single vault write.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::NoRefreshToken`] when no session or stored
    /// grant exists, [`crate::AuthFailure::InvalidCredentials`] when the
    /// current PIN is wrong (counted against the persisted attempt budget;
    /// exhausting it wipes the stored grant), and
    /// [`crate::AuthKitError::Cancelled`] when a prompt is dismissed.
    pub async fn change_pin(
        &self,
        observer: &dyn ChangePinObserver,
    ) -> AuthKitResult<()> {
        let profile = {
            let session = self.session.lock().await;
            session
                .profile()
                .cloned()
                .ok_or(PreconditionFailure::NoRefreshToken)?
        };
        let _guard = self.begin_flow(Some(&profile.id), FlowKind::PinChange)?;

        let credentials = self
            .vault
            .retrieve(&profile.id)?
            .ok_or(PreconditionFailure::NoRefreshToken)?;
        if credentials.refresh_token.is_none() {
            return Err(PreconditionFailure::NoRefreshToken.into());
        }

        let current = match observer.provide_current_pin().await {
            PinEntry::Cancelled => return Err(AuthKitError::Cancelled),
            PinEntry::Entered(pin) => pin,
        };
        self.confirm_pin(&profile.id, &current).await?;

        let new_pin = collect_valid_pin(
            &self.policy,
            |min_length| observer.create_new_pin(min_length),
            |violation| observer.pin_rejected(violation),
        )
        .await?;

        let verifier = PinVerifier::derive(new_pin.expose_secret());
        self.vault.update(&profile.id, move |record| {
            record.pin_verifier = verifier;
            record.failed_pin_attempts = 0;
        })?;

        info!(profile = %profile.id, "pin changed");
        Ok(())
    }
}
