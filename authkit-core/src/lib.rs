//! Client-side mobile authentication session manager.
//!
//! The entry point is [`UserClient`], built once via [`ClientBuilder`] with
//! the client configuration and the host platform's capabilities (device
//! keystore, blob store, biometric sensor, device status). The client
//! orchestrates registration, PIN-based authentication, PIN change, biometric
//! enrollment, push-based mobile authentication, deregistration, and
//! authenticated resource fetching; user interaction happens through narrow
//! observer traits implemented by the host UI.

mod config;
pub use config::{ClientConfig, PinPolicyConfig};

mod error;
pub use error::*;

mod pin_policy;
pub use pin_policy::{PinPolicy, PinPolicyViolation};

mod token;
pub use token::{AccessToken, AuthorizationState};

mod gateway;
pub use gateway::{
    Method, ParameterEncoding, RequestId, ResourceRequest, ResourceResponse,
};

mod observer;
pub use observer::*;

mod platform;
pub use platform::{BiometricSensor, BiometricVerdict, DeviceStatus};

mod client;
pub use client::{ClientBuilder, FlowKind, UserClient};

// private modules
mod http_request;
mod session;

pub use authkit_vault as vault;

/// Result alias used across the SDK.
pub type AuthKitResult<T, E = AuthKitError> = std::result::Result<T, E>;
