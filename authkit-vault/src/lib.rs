//! Encrypted on-device credential storage primitives for AuthKit.
//!
//! The vault persists one sealed record per registered profile plus a sealed
//! profile index. Sealing goes through a host-provided [`DeviceKeystore`] so
//! data at rest is encrypted under a device-bound key that never leaves
//! secure storage; persistence goes through a host-provided
//! [`SecureBlobStore`] with atomic writes.

pub mod error;
pub mod traits;
pub mod types;
pub mod vault;
pub mod verifier;

pub use error::{StorageError, StorageResult};
pub use traits::{DeviceKeystore, SecureBlobStore};
pub use types::{CredentialSet, ProfileId, UserProfile};
pub use vault::CredentialVault;
pub use verifier::PinVerifier;

#[cfg(test)]
pub(crate) mod test_support;
