//! Biometric unlock enrollment.

use rand::RngCore;
use tracing::info;

use authkit_vault::ProfileId;

use crate::client::{FlowKind, UserClient};
use crate::error::{
    AuthKitError, BiometricUnavailableReason, PreconditionFailure,
};
use crate::observer::{BiometricEnrollmentObserver, PinEntry};
use crate::AuthKitResult;

impl UserClient {
    /// True when biometric enrollment is currently possible on this device.
    #[must_use]
    pub fn is_biometric_available(&self) -> bool {
        self.biometric_unavailable_reason().is_none()
    }

    /// Whether `profile_id` has biometric unlock enrolled.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Storage`] when the vault cannot be read.
    pub fn is_biometric_enrolled(
        &self,
        profile_id: &ProfileId,
    ) -> AuthKitResult<bool> {
        Ok(self
            .vault
            .retrieve(profile_id)?
            .is_some_and(|credentials| credentials.biometric_key.is_some()))
    }

    /// Enrolls the signed-in profile for biometric unlock.
    ///
    /// The user confirms their PIN, then a fresh unlock key is generated and
    /// stored alongside the credential set.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::NotAuthenticated`] without a signed-in user,
    /// [`PreconditionFailure::BiometricUnavailable`] naming the first failing
    /// device check, and [`crate::AuthFailure::InvalidCredentials`] for a
    /// wrong PIN, counted against the persisted attempt budget.
    pub async fn enroll_biometric(
        &self,
        observer: &dyn BiometricEnrollmentObserver,
    ) -> AuthKitResult<()> {
        let profile = {
            let session = self.session.lock().await;
            session
                .profile()
                .cloned()
                .ok_or(PreconditionFailure::NotAuthenticated)?
        };
        let _guard =
            self.begin_flow(Some(&profile.id), FlowKind::BiometricEnrollment)?;

        if let Some(reason) = self.biometric_unavailable_reason() {
            return Err(PreconditionFailure::BiometricUnavailable(reason).into());
        }

        let pin = match observer.confirm_current_pin().await {
            PinEntry::Cancelled => return Err(AuthKitError::Cancelled),
            PinEntry::Entered(pin) => pin,
        };
        self.confirm_pin(&profile.id, &pin).await?;

        let mut key = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        self.vault.update(&profile.id, move |record| {
            record.biometric_key = Some(key);
        })?;

        info!(profile = %profile.id, "biometric unlock enrolled");
        Ok(())
    }

    /// Removes biometric unlock from `profile_id`. Idempotent: succeeds even
    /// when nothing was enrolled or the profile is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Storage`] when the vault write fails.
    pub fn disable_biometric(&self, profile_id: &ProfileId) -> AuthKitResult<()> {
        self.vault.update(profile_id, |record| {
            record.biometric_key = None;
        })?;
        Ok(())
    }

    /// First failing device capability check, in a fixed order: sensor
    /// presence, OS-level enrollment, the remote feature flag, device
    /// integrity, minimum OS version.
    pub(crate) fn biometric_unavailable_reason(
        &self,
    ) -> Option<BiometricUnavailableReason> {
        if !self.biometric.is_available() {
            return Some(BiometricUnavailableReason::NoSensor);
        }
        if !self.biometric.has_enrolled_biometrics() {
            return Some(BiometricUnavailableReason::NoEnrolledBiometrics);
        }
        if !self.config.biometric_enabled {
            return Some(BiometricUnavailableReason::FeatureDisabled);
        }
        if self.device.is_compromised() {
            return Some(BiometricUnavailableReason::DeviceCompromised);
        }
        if self.device.os_version() < self.config.min_os_version {
            return Some(BiometricUnavailableReason::OsVersionTooLow);
        }
        None
    }
}
