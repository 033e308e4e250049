//! Profile registration.

use std::time::{SystemTime, UNIX_EPOCH};

use secrecy::ExposeSecret;
use tracing::info;

use authkit_vault::{CredentialSet, PinVerifier, UserProfile};

use crate::client::{collect_valid_pin, FlowKind, UserClient};
use crate::observer::RegistrationObserver;
use crate::AuthKitResult;

impl UserClient {
    /// Registers a new user profile.
    ///
    /// Performs dynamic client registration for the requested scopes, asks
    /// the observer for a policy-valid PIN (re-prompting on rejection), and
    /// persists the new credential set. Nothing is stored until the PIN is
    /// accepted.
    ///
    /// # Errors
    ///
    /// [`crate::PreconditionFailure::AlreadyInProgress`] when a registration
    /// is already running, [`crate::AuthKitError::Cancelled`] when the user
    /// dismisses the PIN prompt, and network or storage errors from the
    /// registration exchange and the vault write.
    pub async fn register(
        &self,
        scopes: &[String],
        observer: &dyn RegistrationObserver,
    ) -> AuthKitResult<UserProfile> {
        let _guard = self.begin_flow(None, FlowKind::Registration)?;

        let (client_id, client_secret) = self.tokens.register_client(scopes).await?;

        let pin = collect_valid_pin(
            &self.policy,
            |min_length| observer.create_pin(min_length),
            |violation| observer.pin_rejected(violation),
        )
        .await?;

        let display_name = format!("Profile {}", self.vault.list_profiles()?.len() + 1);
        let registered_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        let profile = UserProfile::new(display_name, registered_at);

        let mut credentials = CredentialSet::new(
            client_id,
            client_secret,
            PinVerifier::derive(pin.expose_secret()),
        );
        credentials.scopes = scopes.to_vec();
        self.vault.store(&profile, &credentials)?;

        info!(profile = %profile.id, "profile registered");
        Ok(profile)
    }
}
