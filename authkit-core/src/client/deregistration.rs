//! Profile removal.

use tracing::{info, warn};

use authkit_vault::ProfileId;

use crate::client::{FlowKind, UserClient};
use crate::observer::DeregistrationObserver;
use crate::AuthKitResult;

impl UserClient {
    /// Removes `profile_id` from the device.
    ///
    /// Local removal comes first and is authoritative: the credential set is
    /// deleted from the vault and the session is reset when the profile was
    /// signed in. Server-side grant revocation runs afterwards on a
    /// best-effort basis; a failure is reported through the observer but does
    /// not undo the removal.
    ///
    /// # Errors
    ///
    /// [`crate::PreconditionFailure::AlreadyInProgress`] when a
    /// deregistration for the profile is already running, and
    /// [`crate::AuthKitError::Storage`] when the vault delete fails.
    pub async fn deregister(
        &self,
        profile_id: &ProfileId,
        observer: &dyn DeregistrationObserver,
    ) -> AuthKitResult<()> {
        let _guard = self.begin_flow(Some(profile_id), FlowKind::Deregistration)?;

        // Read the credentials before they are destroyed; revocation still
        // needs them.
        let credentials = self.vault.retrieve(profile_id)?;

        self.vault.delete(profile_id)?;
        {
            let mut session = self.session.lock().await;
            if session.profile().is_some_and(|p| p.id == *profile_id) {
                session.reset();
            }
        }
        info!(profile = %profile_id, "profile removed locally");

        if let Some(credentials) = credentials {
            if let Err(err) = self.tokens.revoke(&credentials).await {
                warn!(profile = %profile_id, error = %err, "grant revocation failed");
                observer.revocation_failed(&err);
            }
        }
        Ok(())
    }
}
