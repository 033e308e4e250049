//! Profile and credential record types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::verifier::PinVerifier;

/// Opaque identifier of a locally registered profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(String);

impl ProfileId {
    /// Generates a fresh random profile identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProfileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A locally registered identity capable of authenticating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Unique profile identifier.
    pub id: ProfileId,
    /// Display metadata for the host UI.
    pub display_name: String,
    /// Unix timestamp of the registration that created this profile.
    pub registered_at: u64,
}

impl UserProfile {
    /// Creates a new profile with a generated identifier.
    #[must_use]
    pub fn new(display_name: impl Into<String>, registered_at: u64) -> Self {
        Self {
            id: ProfileId::generate(),
            display_name: display_name.into(),
            registered_at,
        }
    }
}

/// Per-profile secret material.
///
/// The whole set is sealed into a single record blob so every mutation (PIN
/// change, token rotation, attempt counting) is one atomic write. Zeroized on
/// drop; deliberately does not implement `Debug`.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialSet {
    /// OAuth client identifier obtained through dynamic client registration.
    pub client_id: String,
    /// OAuth client secret paired with `client_id`.
    pub client_secret: String,
    /// Scopes requested at registration, replayed when the dynamic client
    /// has to be registered again after its credentials were cleared.
    #[serde(default)]
    #[zeroize(skip)]
    pub scopes: Vec<String>,
    /// Long-lived refresh token, present after the first successful token
    /// exchange. A profile without it requires a full authentication.
    pub refresh_token: Option<String>,
    /// Salted verifier for the profile's PIN.
    #[zeroize(skip)]
    pub pin_verifier: PinVerifier,
    /// Key material activating biometric unlock, when enrolled.
    pub biometric_key: Option<Vec<u8>>,
    /// Challenge decryption key for push-based mobile authentication, when
    /// enrolled.
    pub mobile_auth_key: Option<Vec<u8>>,
    /// Consecutive failed PIN entries since the last successful one.
    #[zeroize(skip)]
    pub failed_pin_attempts: u32,
}

impl CredentialSet {
    /// Creates a credential set for a freshly registered profile.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        pin_verifier: PinVerifier,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            refresh_token: None,
            pin_verifier,
            biometric_key: None,
            mobile_auth_key: None,
            failed_pin_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_ids_are_unique() {
        assert_ne!(ProfileId::generate(), ProfileId::generate());
    }

    #[test]
    fn credential_set_round_trips_through_cbor() {
        let mut set = CredentialSet::new("cid", "secret", PinVerifier::derive("12934"));
        set.scopes = vec!["read".to_string()];
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&set, &mut bytes).expect("serialize");
        let decoded: CredentialSet =
            ciborium::de::from_reader(bytes.as_slice()).expect("deserialize");
        assert_eq!(decoded.client_id, "cid");
        assert_eq!(decoded.scopes, vec!["read".to_string()]);
        assert_eq!(decoded.refresh_token, None);
        assert!(decoded.pin_verifier.matches("12934"));
    }
}
