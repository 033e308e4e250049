//! Salted PIN verifier.
//!
//! Stores a derived digest of the PIN so an entered PIN can be confirmed
//! without ever persisting the PIN itself.

use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const VERIFIER_INFO: &[u8] = b"authkit:pin-verifier";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

/// Stored representation of a PIN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinVerifier {
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl PinVerifier {
    /// Derives a verifier for `pin` under a fresh random salt.
    #[must_use]
    pub fn derive(pin: &str) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let digest = digest_for(&salt, pin);
        Self { salt, digest }
    }

    /// Returns true if `pin` matches this verifier. Constant-time in the
    /// digest comparison.
    #[must_use]
    pub fn matches(&self, pin: &str) -> bool {
        let candidate = digest_for(&self.salt, pin);
        candidate.ct_eq(&self.digest).into()
    }
}

fn digest_for(salt: &[u8], pin: &str) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(Some(salt), pin.as_bytes());
    let mut out = vec![0u8; DIGEST_LEN];
    // DIGEST_LEN is far below the HKDF-SHA256 output limit.
    hk.expand(VERIFIER_INFO, &mut out)
        .expect("digest length within hkdf bounds");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_original_pin_only() {
        let verifier = PinVerifier::derive("72914");
        assert!(verifier.matches("72914"));
        assert!(!verifier.matches("72915"));
        assert!(!verifier.matches(""));
    }

    #[test]
    fn same_pin_derives_distinct_verifiers() {
        let first = PinVerifier::derive("72914");
        let second = PinVerifier::derive("72914");
        assert_ne!(first, second);
        assert!(first.matches("72914"));
        assert!(second.matches("72914"));
    }
}
