//! Platform interfaces backing the credential vault.

use crate::error::StorageResult;

/// Device keystore interface used to seal and open credential records.
///
/// Implementations bind the sealing key to the device (hardware keystore,
/// Secure Enclave, TPM). The key must not be extractable by the SDK.
pub trait DeviceKeystore: Send + Sync {
    /// Seals plaintext under the device-bound key, authenticating
    /// `associated_data`.
    ///
    /// The associated data is not encrypted, but it is integrity-protected as
    /// part of the seal operation. Any mismatch when opening must fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the keystore refuses the operation or the seal
    /// fails.
    fn seal(&self, associated_data: &[u8], plaintext: &[u8])
        -> StorageResult<Vec<u8>>;

    /// Opens ciphertext under the device-bound key, verifying
    /// `associated_data`.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the keystore cannot open
    /// the ciphertext.
    fn open_sealed(
        &self,
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> StorageResult<Vec<u8>>;
}

/// Atomic blob store for small sealed records.
///
/// `put` must be atomic: after a crash either the previous or the new blob is
/// visible, never a partial write.
pub trait SecureBlobStore: Send + Sync {
    /// Writes `bytes` atomically under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Reads the blob stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Deletes the blob stored under `key`. Deleting a missing key is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&self, key: &str) -> StorageResult<()>;
}
