//! The credential vault.
//!
//! One sealed record blob per profile plus a sealed profile index. The index
//! is the commit point for profile visibility: `retrieve` consults it before
//! touching any record, so removing the index entry makes a delete observably
//! atomic even when the record blob outlives it. Such an orphan is
//! unreachable, and a retried delete reclaims the blob.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::traits::{DeviceKeystore, SecureBlobStore};
use crate::types::{CredentialSet, ProfileId, UserProfile};

const PROFILE_INDEX_KEY: &str = "profiles.bin";
const PROFILE_INDEX_AD: &[u8] = b"authkit:profile-index";
const RECORD_AD_PREFIX: &[u8] = b"authkit:credential-set:";

/// Durable, encrypted storage of per-profile secrets.
///
/// Mutations to a given profile's record are serialized by a per-profile
/// mutex and index mutations by an index mutex, so flows touching unrelated
/// profiles do not block each other.
pub struct CredentialVault {
    keystore: Arc<dyn DeviceKeystore>,
    blobs: Arc<dyn SecureBlobStore>,
    index_lock: Mutex<()>,
    record_locks: Mutex<HashMap<ProfileId, Arc<Mutex<()>>>>,
}

impl CredentialVault {
    /// Creates a vault over the host-provided keystore and blob store.
    pub fn new(
        keystore: Arc<dyn DeviceKeystore>,
        blobs: Arc<dyn SecureBlobStore>,
    ) -> Self {
        Self {
            keystore,
            blobs,
            index_lock: Mutex::new(()),
            record_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persists a profile and its credential set.
    ///
    /// The record blob is written first; the profile only becomes visible
    /// once the index write lands.
    ///
    /// # Errors
    ///
    /// Returns an error if sealing or either write fails. A failed index
    /// write leaves the profile invisible.
    pub fn store(
        &self,
        profile: &UserProfile,
        credentials: &CredentialSet,
    ) -> StorageResult<()> {
        {
            let lock = self.record_lock(&profile.id)?;
            let _guard = lock
                .lock()
                .map_err(|_| StorageError::WriteFailed(poisoned(&profile.id)))?;
            self.write_record(&profile.id, credentials)?;
        }

        let _index = self
            .index_lock
            .lock()
            .map_err(|_| StorageError::WriteFailed("index lock poisoned".into()))?;
        let mut profiles = self.load_index()?;
        profiles.retain(|known| known.id != profile.id);
        profiles.push(profile.clone());
        self.write_index(&profiles)?;
        debug!(profile = %profile.id, "credential set stored");
        Ok(())
    }

    /// Returns the credential set for `id`, or `None` for unknown profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the index or record cannot be read or opened.
    pub fn retrieve(&self, id: &ProfileId) -> StorageResult<Option<CredentialSet>> {
        if self.profile(id)?.is_none() {
            return Ok(None);
        }
        self.read_record(id)
    }

    /// Applies `mutate` to the credential set of `id` and writes the result
    /// back as a single atomic record write.
    ///
    /// Returns `false` without side effects when the profile is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read, opened, or rewritten.
    /// On error the previously stored record remains intact.
    pub fn update<F>(&self, id: &ProfileId, mutate: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut CredentialSet),
    {
        if self.profile(id)?.is_none() {
            return Ok(false);
        }
        let lock = self.record_lock(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| StorageError::WriteFailed(poisoned(id)))?;
        let Some(mut credentials) = self.read_record(id)? else {
            return Ok(false);
        };
        mutate(&mut credentials);
        self.write_record(id, &credentials)?;
        debug!(profile = %id, "credential set updated");
        Ok(true)
    }

    /// Removes all credential material for `id`.
    ///
    /// The index entry is removed first; once that write lands the profile is
    /// gone from `list_profiles` and `retrieve` regardless of the record
    /// blob's fate. The record blob is removed even when the index entry was
    /// already gone, so retrying a delete whose record removal failed
    /// reclaims the orphaned blob. Deleting an unknown profile succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the index rewrite or the record delete fails. When
    /// the index rewrite fails, no credential material has been removed.
    pub fn delete(&self, id: &ProfileId) -> StorageResult<()> {
        {
            let _index = self.index_lock.lock().map_err(|_| {
                StorageError::DeleteFailed("index lock poisoned".into())
            })?;
            let mut profiles = self.load_index()?;
            let before = profiles.len();
            profiles.retain(|known| known.id != *id);
            if profiles.len() != before {
                self.write_index(&profiles)?;
            }
        }

        let lock = self.record_lock(id)?;
        let _guard = lock
            .lock()
            .map_err(|_| StorageError::DeleteFailed(poisoned(id)))?;
        self.blobs.delete(&record_key(id))?;
        self.record_locks
            .lock()
            .map_err(|_| StorageError::DeleteFailed(poisoned(id)))?
            .remove(id);
        debug!(profile = %id, "credential set deleted");
        Ok(())
    }

    /// Lists all locally registered profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or opened.
    pub fn list_profiles(&self) -> StorageResult<Vec<UserProfile>> {
        self.load_index()
    }

    /// Returns the profile metadata for `id`, if registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or opened.
    pub fn profile(&self, id: &ProfileId) -> StorageResult<Option<UserProfile>> {
        Ok(self
            .load_index()?
            .into_iter()
            .find(|profile| profile.id == *id))
    }

    fn record_lock(&self, id: &ProfileId) -> StorageResult<Arc<Mutex<()>>> {
        let mut locks = self
            .record_locks
            .lock()
            .map_err(|_| StorageError::WriteFailed(poisoned(id)))?;
        Ok(Arc::clone(
            locks.entry(id.clone()).or_insert_with(Default::default),
        ))
    }

    fn load_index(&self) -> StorageResult<Vec<UserProfile>> {
        match self.blobs.get(PROFILE_INDEX_KEY)? {
            None => Ok(Vec::new()),
            Some(sealed) => {
                let bytes = self.keystore.open_sealed(PROFILE_INDEX_AD, &sealed)?;
                ciborium::de::from_reader(bytes.as_slice())
                    .map_err(|err| StorageError::Serialization(err.to_string()))
            }
        }
    }

    fn write_index(&self, profiles: &[UserProfile]) -> StorageResult<()> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&profiles, &mut bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let sealed = self.keystore.seal(PROFILE_INDEX_AD, &bytes)?;
        self.blobs.put(PROFILE_INDEX_KEY, &sealed)
    }

    fn read_record(&self, id: &ProfileId) -> StorageResult<Option<CredentialSet>> {
        match self.blobs.get(&record_key(id))? {
            None => Ok(None),
            Some(sealed) => {
                let bytes = self.keystore.open_sealed(&record_ad(id), &sealed)?;
                let credentials = ciborium::de::from_reader(bytes.as_slice())
                    .map_err(|err| StorageError::Serialization(err.to_string()))?;
                Ok(Some(credentials))
            }
        }
    }

    fn write_record(
        &self,
        id: &ProfileId,
        credentials: &CredentialSet,
    ) -> StorageResult<()> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(credentials, &mut bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let sealed = self.keystore.seal(&record_ad(id), &bytes)?;
        self.blobs.put(&record_key(id), &sealed)
    }
}

fn record_key(id: &ProfileId) -> String {
    format!("credentials/{id}.bin")
}

fn record_ad(id: &ProfileId) -> Vec<u8> {
    let mut ad = Vec::with_capacity(RECORD_AD_PREFIX.len() + id.as_str().len());
    ad.extend_from_slice(RECORD_AD_PREFIX);
    ad.extend_from_slice(id.as_str().as_bytes());
    ad
}

fn poisoned(id: &ProfileId) -> String {
    format!("record lock poisoned for profile {id}")
}
