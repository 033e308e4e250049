//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use tokio::sync::Notify;

use authkit_core::vault::{
    DeviceKeystore, SecureBlobStore, StorageError, StorageResult, UserProfile,
};
use authkit_core::{
    AuthKitError, AuthKitResult, AuthenticationObserver, BiometricEnrollmentObserver,
    BiometricSensor, BiometricVerdict, ChallengeDecision, ChallengeMessage,
    ChangePinObserver, ClientConfig, DeregistrationObserver, DeviceStatus,
    MobileAuthDelegate, PinEntry, PinPolicyViolation, RegistrationObserver,
    RequestId, ResourceDelegate, ResourceResponse, UserClient,
};

pub struct InMemoryKeystore {
    key: [u8; 32],
}

impl InMemoryKeystore {
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }
}

impl Default for InMemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceKeystore for InMemoryKeystore {
    fn seal(&self, associated_data: &[u8], plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce_bytes = [0u8; 24];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|err| StorageError::Crypto(err.to_string()))?;
        let mut out = Vec::with_capacity(nonce_bytes.len() + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn open_sealed(
        &self,
        associated_data: &[u8],
        ciphertext: &[u8],
    ) -> StorageResult<Vec<u8>> {
        if ciphertext.len() < 24 {
            return Err(StorageError::Crypto(
                "keystore ciphertext too short".to_string(),
            ));
        }
        let (nonce_bytes, payload) = ciphertext.split_at(24);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: payload,
                    aad: associated_data,
                },
            )
            .map_err(|err| StorageError::Crypto(err.to_string()))
    }
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureBlobStore for InMemoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        self.blobs
            .lock()
            .map_err(|_| StorageError::WriteFailed("mutex poisoned".to_string()))?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let guard = self
            .blobs
            .lock()
            .map_err(|_| StorageError::ReadFailed("mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.blobs
            .lock()
            .map_err(|_| StorageError::DeleteFailed("mutex poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

pub struct TestSensor {
    pub available: bool,
    pub enrolled: bool,
    pub verdict: BiometricVerdict,
}

impl Default for TestSensor {
    fn default() -> Self {
        Self {
            available: false,
            enrolled: false,
            verdict: BiometricVerdict::Denied,
        }
    }
}

#[async_trait]
impl BiometricSensor for TestSensor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn has_enrolled_biometrics(&self) -> bool {
        self.enrolled
    }

    async fn authenticate(&self) -> BiometricVerdict {
        self.verdict
    }
}

pub struct TestDevice {
    pub os_version: u32,
    pub compromised: bool,
}

impl Default for TestDevice {
    fn default() -> Self {
        Self {
            os_version: 34,
            compromised: false,
        }
    }
}

impl DeviceStatus for TestDevice {
    fn os_version(&self) -> u32 {
        self.os_version
    }

    fn is_compromised(&self) -> bool {
        self.compromised
    }
}

/// Scripted PIN prompts: answers are consumed in order, rejections are
/// recorded for assertions.
pub struct PinScript {
    entries: Mutex<VecDeque<PinEntry>>,
    rejections: Mutex<Vec<String>>,
}

impl PinScript {
    pub fn new(pins: &[&str]) -> Self {
        Self {
            entries: Mutex::new(pins.iter().map(|pin| PinEntry::pin(*pin)).collect()),
            rejections: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            entries: Mutex::new(VecDeque::from([PinEntry::Cancelled])),
            rejections: Mutex::new(Vec::new()),
        }
    }

    pub fn rejections(&self) -> Vec<String> {
        self.rejections.lock().expect("rejections lock").clone()
    }

    fn next(&self) -> PinEntry {
        self.entries
            .lock()
            .expect("entries lock")
            .pop_front()
            .expect("pin script exhausted")
    }

    fn record(&self, violation: &PinPolicyViolation) {
        self.rejections
            .lock()
            .expect("rejections lock")
            .push(violation.to_string());
    }
}

#[async_trait]
impl RegistrationObserver for PinScript {
    async fn create_pin(&self, _min_length: u32) -> PinEntry {
        self.next()
    }

    fn pin_rejected(&self, violation: &PinPolicyViolation) {
        self.record(violation);
    }
}

#[async_trait]
impl AuthenticationObserver for PinScript {
    async fn provide_pin(
        &self,
        _profile: &UserProfile,
        _attempts_remaining: u32,
    ) -> PinEntry {
        self.next()
    }
}

#[async_trait]
impl ChangePinObserver for PinScript {
    async fn provide_current_pin(&self) -> PinEntry {
        self.next()
    }

    async fn create_new_pin(&self, _min_length: u32) -> PinEntry {
        self.next()
    }

    fn pin_rejected(&self, violation: &PinPolicyViolation) {
        self.record(violation);
    }
}

#[async_trait]
impl BiometricEnrollmentObserver for PinScript {
    async fn confirm_current_pin(&self) -> PinEntry {
        self.next()
    }
}

/// PIN prompt that signals when reached and waits for an explicit release,
/// for tests exercising flow mutual exclusion.
pub struct GatedPinObserver {
    pub prompted: Arc<Notify>,
    pub release: Arc<Notify>,
    pin: String,
}

impl GatedPinObserver {
    pub fn new(pin: &str) -> Self {
        Self {
            prompted: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            pin: pin.to_string(),
        }
    }
}

#[async_trait]
impl AuthenticationObserver for GatedPinObserver {
    async fn provide_pin(
        &self,
        _profile: &UserProfile,
        _attempts_remaining: u32,
    ) -> PinEntry {
        self.prompted.notify_one();
        self.release.notified().await;
        PinEntry::pin(self.pin.clone())
    }
}

#[derive(Default)]
pub struct RevocationRecorder {
    failures: Mutex<Vec<String>>,
}

impl RevocationRecorder {
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().expect("failures lock").clone()
    }
}

impl DeregistrationObserver for RevocationRecorder {
    fn revocation_failed(&self, error: &AuthKitError) {
        self.failures
            .lock()
            .expect("failures lock")
            .push(error.to_string());
    }
}

/// Forwards resource outcomes over a channel so tests can await them.
pub struct ChannelDelegate {
    tx: tokio::sync::mpsc::UnboundedSender<(RequestId, AuthKitResult<ResourceResponse>)>,
}

pub fn channel_delegate() -> (
    Arc<ChannelDelegate>,
    tokio::sync::mpsc::UnboundedReceiver<(RequestId, AuthKitResult<ResourceResponse>)>,
) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (Arc::new(ChannelDelegate { tx }), rx)
}

impl ResourceDelegate for ChannelDelegate {
    fn on_response(
        &self,
        request_id: RequestId,
        outcome: AuthKitResult<ResourceResponse>,
    ) {
        let _ = self.tx.send((request_id, outcome));
    }
}

pub struct ApproveAll;

#[async_trait]
impl MobileAuthDelegate for ApproveAll {
    async fn review_challenge(&self, _challenge: &ChallengeMessage) -> ChallengeDecision {
        ChallengeDecision::Approve
    }
}

/// Panics when consulted; for notifications that must be ignored without
/// reaching the delegate.
pub struct NoChallengeExpected;

#[async_trait]
impl MobileAuthDelegate for NoChallengeExpected {
    async fn review_challenge(&self, challenge: &ChallengeMessage) -> ChallengeDecision {
        panic!("unexpected challenge review for {}", challenge.transaction_id);
    }
}

/// Installs a tracing subscriber honoring `RUST_LOG`, defaulting to warnings.
/// Safe to call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

pub fn test_config(base_url: &str) -> ClientConfig {
    init_tracing();
    ClientConfig::from_json(&format!(
        r#"{{
            "base_url": "{base_url}",
            "resource_base_url": "{base_url}",
            "redirect_url": "demo://auth.example.com",
            "biometric_enabled": true
        }}"#
    ))
    .expect("valid test config")
}

pub fn build_client(config: ClientConfig) -> UserClient {
    UserClient::builder()
        .config(config)
        .keystore(Arc::new(InMemoryKeystore::new()))
        .blob_store(Arc::new(InMemoryBlobStore::new()))
        .biometric_sensor(Arc::new(TestSensor::default()))
        .device_status(Arc::new(TestDevice::default()))
        .build()
        .expect("client builds")
}
