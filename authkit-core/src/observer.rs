//! Observer and delegate interfaces implemented by the host UI.
//!
//! Each capability gets its own narrow trait; hosts implement only what they
//! use. The SDK never holds an observer past the flow's terminal outcome, and
//! every started flow produces exactly one terminal outcome.

use async_trait::async_trait;
use secrecy::SecretString;

use authkit_vault::UserProfile;

use crate::error::AuthKitError;
use crate::gateway::{RequestId, ResourceResponse};
use crate::pin_policy::PinPolicyViolation;
use crate::AuthKitResult;

/// A user's answer to a PIN prompt.
pub enum PinEntry {
    /// The user entered a PIN.
    Entered(SecretString),
    /// The user dismissed the prompt; the flow ends with
    /// [`AuthKitError::Cancelled`].
    Cancelled,
}

impl PinEntry {
    /// Convenience constructor wrapping a PIN string.
    #[must_use]
    pub fn pin(pin: impl Into<String>) -> Self {
        Self::Entered(SecretString::from(pin.into()))
    }
}

/// Callbacks of the registration flow.
#[async_trait]
pub trait RegistrationObserver: Send + Sync {
    /// Asks the user to choose a PIN of at least `min_length` digits.
    async fn create_pin(&self, min_length: u32) -> PinEntry;

    /// Reports a rejected PIN candidate; the prompt repeats afterwards.
    fn pin_rejected(&self, violation: &PinPolicyViolation);
}

/// Callbacks of the authentication flow.
#[async_trait]
pub trait AuthenticationObserver: Send + Sync {
    /// Asks the user for the PIN of `profile`. `attempts_remaining` counts
    /// this prompt.
    async fn provide_pin(
        &self,
        profile: &UserProfile,
        attempts_remaining: u32,
    ) -> PinEntry;
}

/// Callbacks of the PIN change flow.
#[async_trait]
pub trait ChangePinObserver: Send + Sync {
    /// Asks for the current PIN as a re-authentication step.
    async fn provide_current_pin(&self) -> PinEntry;

    /// Asks the user to choose the new PIN.
    async fn create_new_pin(&self, min_length: u32) -> PinEntry;

    /// Reports a rejected new-PIN candidate; the prompt repeats afterwards.
    fn pin_rejected(&self, violation: &PinPolicyViolation);
}

/// Callbacks of the biometric enrollment flow.
#[async_trait]
pub trait BiometricEnrollmentObserver: Send + Sync {
    /// Asks for the current PIN before activating biometric unlock.
    async fn confirm_current_pin(&self) -> PinEntry;
}

/// Callbacks of the deregistration flow.
pub trait DeregistrationObserver: Send + Sync {
    /// Reports a failed server-side revocation. Local removal has already
    /// succeeded when this fires.
    fn revocation_failed(&self, error: &AuthKitError);
}

/// A decrypted mobile-authentication challenge awaiting user review.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChallengeMessage {
    /// Transaction this challenge belongs to.
    pub transaction_id: String,
    /// Human-readable message to present to the user.
    pub message: String,
}

/// User verdict on a mobile-authentication challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeDecision {
    /// Confirm the transaction.
    Approve,
    /// Reject the transaction.
    Deny,
}

/// Delegate reviewing push-based mobile authentication challenges.
#[async_trait]
pub trait MobileAuthDelegate: Send + Sync {
    /// Presents the decoded challenge for approval or denial.
    async fn review_challenge(&self, challenge: &ChallengeMessage)
        -> ChallengeDecision;
}

/// Delegate receiving the outcome of a [`crate::UserClient::fetch_resource`]
/// call. Invoked exactly once per request.
pub trait ResourceDelegate: Send + Sync {
    /// Delivers the response or error for the request identified by
    /// `request_id`.
    fn on_response(
        &self,
        request_id: RequestId,
        outcome: AuthKitResult<ResourceResponse>,
    );
}
