//! Error outputs from AuthKit.

use thiserror::Error;

pub use authkit_vault::StorageError;

use crate::client::FlowKind;
use crate::pin_policy::PinPolicyViolation;

/// Top-level error type returned by every SDK operation.
#[derive(Debug, Error)]
pub enum AuthKitError {
    /// A candidate PIN violates the configured PIN policy.
    #[error("pin policy violation: {0}")]
    Policy(#[from] PinPolicyViolation),

    /// An operation precondition failed before any network interaction.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionFailure),

    /// Network transport failure.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Authentication or token lifecycle failure.
    #[error("authentication failure: {0}")]
    Auth(#[from] AuthFailure),

    /// Credential vault failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The flow was cancelled by the user before reaching a terminal outcome.
    #[error("flow cancelled")]
    Cancelled,

    /// Unexpected error encoding or decoding protocol payloads.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid or incomplete client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Synchronously detected precondition failures.
///
/// These are reported before any network round-trip is attempted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    /// The flow requires a stored refresh token and none exists.
    #[error("no refresh token registered")]
    NoRefreshToken,

    /// Biometric enrollment is not possible on this device.
    #[error("biometric authentication unavailable: {0}")]
    BiometricUnavailable(BiometricUnavailableReason),

    /// No device push token has been stored in the session.
    #[error("no device push token stored in session")]
    NoPushToken,

    /// A flow of the same kind is already running for this profile.
    #[error("{0} flow already in progress")]
    AlreadyInProgress(FlowKind),

    /// The operation requires an authenticated user.
    #[error("no authenticated user")]
    NotAuthenticated,

    /// The profile is not enrolled for mobile authentication.
    #[error("profile not enrolled for mobile authentication")]
    MobileAuthNotEnrolled,

    /// The callback URL does not match the configured redirect URL.
    #[error("redirect url mismatch")]
    RedirectMismatch,
}

/// Reasons biometric authentication can be unavailable, checked in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum BiometricUnavailableReason {
    /// The device has no usable biometric sensor.
    NoSensor,
    /// No biometric credential is enrolled at the OS level.
    NoEnrolledBiometrics,
    /// The feature is disabled by remote configuration.
    FeatureDisabled,
    /// The device failed the integrity check.
    DeviceCompromised,
    /// The device OS version is below the configured minimum.
    OsVersionTooLow,
}

/// Network transport errors, surfaced after bounded transient retries.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The request timed out.
    #[error("request timed out: {url}")]
    Timeout {
        /// URL of the failed request.
        url: String,
    },

    /// The server could not be reached.
    #[error("server unreachable: {url}: {reason}")]
    Unreachable {
        /// URL of the failed request.
        url: String,
        /// Underlying transport failure.
        reason: String,
    },

    /// The server answered with an error status.
    #[error("server error {status}: {url}")]
    ServerError {
        /// URL of the failed request.
        url: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Authentication and token lifecycle failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The presented credentials were rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The stored grant was revoked by the server.
    #[error("grant revoked")]
    Revoked,

    /// The access token is expired and could not be silently renewed.
    #[error("access token expired")]
    Expired,
}
