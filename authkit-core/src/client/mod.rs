//! Client construction and session queries.

mod authentication;
mod biometric;
mod deregistration;
mod flows;
mod mobile_auth;
mod pin_change;
mod registration;
mod resources;

use std::future::Future;
use std::sync::Arc;

use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::info;

use authkit_vault::{
    CredentialVault, DeviceKeystore, ProfileId, SecureBlobStore, UserProfile,
};

pub use flows::FlowKind;
use flows::{FlowGuard, FlowRegistry};

use crate::config::ClientConfig;
use crate::error::{AuthFailure, AuthKitError, PreconditionFailure};
use crate::gateway::ResourceGateway;
use crate::http_request::HttpClient;
use crate::observer::PinEntry;
use crate::pin_policy::{PinPolicy, PinPolicyViolation};
use crate::platform::{BiometricSensor, DeviceStatus};
use crate::session::Session;
use crate::token::{AuthorizationState, TokenManager};
use crate::AuthKitResult;

/// The session manager. One instance per application process.
///
/// Holds the credential vault, the in-process session, and the network
/// clients; all user-facing flows hang off this type.
pub struct UserClient {
    config: Arc<ClientConfig>,
    http: Arc<HttpClient>,
    vault: Arc<CredentialVault>,
    gateway: Arc<ResourceGateway>,
    tokens: TokenManager,
    policy: PinPolicy,
    session: Arc<Mutex<Session>>,
    flows: Arc<FlowRegistry>,
    biometric: Arc<dyn BiometricSensor>,
    device: Arc<dyn DeviceStatus>,
}

impl UserClient {
    /// Starts assembling a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// True while a non-expired access token is held.
    pub async fn is_authorized(&self) -> bool {
        self.session.lock().await.is_authorized()
    }

    /// Current authorization state.
    pub async fn authorization_state(&self) -> AuthorizationState {
        self.session.lock().await.state()
    }

    /// The currently signed-in profile, if any.
    pub async fn authenticated_profile(&self) -> Option<UserProfile> {
        self.session.lock().await.profile().cloned()
    }

    /// The current access token value, if one is held and not expired.
    pub async fn access_token(&self) -> Option<SecretString> {
        let session = self.session.lock().await;
        session
            .access_token()
            .filter(|token| !token.is_expired())
            .map(|token| {
                SecretString::from(token.secret().expose_secret().to_owned())
            })
    }

    /// All registered profiles, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Storage`] when the vault cannot be read.
    pub fn registered_profiles(&self) -> AuthKitResult<Vec<UserProfile>> {
        Ok(self.vault.list_profiles()?)
    }

    /// Checks a candidate PIN against the configured policy without touching
    /// any stored state.
    ///
    /// # Errors
    ///
    /// Returns the first [`PinPolicyViolation`] in the fixed check order.
    pub fn is_pin_valid(&self, pin: &str) -> Result<(), PinPolicyViolation> {
        self.policy.validate(pin)
    }

    /// Stores or clears the device push token for this session. Mobile
    /// authentication enrollment requires one to be present.
    pub async fn store_device_push_token(&self, token: Option<String>) {
        self.session.lock().await.set_push_token(token);
    }

    /// Completes a browser-based authentication callback.
    ///
    /// The callback URL must match the configured redirect URL in scheme and
    /// host and carry a `code` query parameter, which is exchanged for tokens
    /// on behalf of the currently authenticating profile.
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::RedirectMismatch`] for foreign URLs,
    /// [`PreconditionFailure::NotAuthenticated`] when no profile is pending,
    /// and [`AuthFailure::InvalidCredentials`] when the code is missing or
    /// rejected.
    pub async fn handle_authentication_callback(
        &self,
        callback_url: &str,
    ) -> AuthKitResult<()> {
        let url = Url::parse(callback_url).map_err(|_| {
            AuthKitError::from(PreconditionFailure::RedirectMismatch)
        })?;
        if !self.config.redirect_matches(&url) {
            return Err(PreconditionFailure::RedirectMismatch.into());
        }
        let code = url
            .query_pairs()
            .find(|(name, _)| name == "code")
            .map(|(_, value)| value.into_owned())
            .ok_or(AuthFailure::InvalidCredentials)?;

        let profile = {
            let session = self.session.lock().await;
            session
                .profile()
                .cloned()
                .ok_or(PreconditionFailure::NotAuthenticated)?
        };
        let credentials = self
            .vault
            .retrieve(&profile.id)?
            .ok_or(AuthFailure::InvalidCredentials)?;

        let (token, rotated) = self.tokens.exchange_code(&credentials, &code).await?;
        if let Some(refresh_token) = rotated {
            self.vault.update(&profile.id, |record| {
                record.refresh_token = Some(refresh_token);
            })?;
        }
        self.session.lock().await.authorize(profile, token);
        info!("authentication callback completed");
        Ok(())
    }
}

/// Collects a policy-valid PIN from the user, reporting each rejected
/// candidate and re-prompting until the entry passes or is cancelled.
pub(crate) async fn collect_valid_pin<P, Fut>(
    policy: &PinPolicy,
    mut prompt: P,
    mut rejected: impl FnMut(&PinPolicyViolation),
) -> AuthKitResult<SecretString>
where
    P: FnMut(u32) -> Fut,
    Fut: Future<Output = PinEntry>,
{
    loop {
        match prompt(policy.min_length()).await {
            PinEntry::Cancelled => return Err(AuthKitError::Cancelled),
            PinEntry::Entered(pin) => match policy.validate(pin.expose_secret()) {
                Ok(()) => return Ok(pin),
                Err(violation) => rejected(&violation),
            },
        }
    }
}

/// Assembles a [`UserClient`] from the configuration and the host platform's
/// capabilities.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    keystore: Option<Arc<dyn DeviceKeystore>>,
    blob_store: Option<Arc<dyn SecureBlobStore>>,
    biometric_sensor: Option<Arc<dyn BiometricSensor>>,
    device_status: Option<Arc<dyn DeviceStatus>>,
}

impl ClientBuilder {
    /// Sets the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the device keystore backing the credential vault.
    #[must_use]
    pub fn keystore(mut self, keystore: Arc<dyn DeviceKeystore>) -> Self {
        self.keystore = Some(keystore);
        self
    }

    /// Sets the blob store backing the credential vault.
    #[must_use]
    pub fn blob_store(mut self, blob_store: Arc<dyn SecureBlobStore>) -> Self {
        self.blob_store = Some(blob_store);
        self
    }

    /// Sets the biometric sensor interface.
    #[must_use]
    pub fn biometric_sensor(mut self, sensor: Arc<dyn BiometricSensor>) -> Self {
        self.biometric_sensor = Some(sensor);
        self
    }

    /// Sets the device status interface.
    #[must_use]
    pub fn device_status(mut self, status: Arc<dyn DeviceStatus>) -> Self {
        self.device_status = Some(status);
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthKitError::Configuration`] naming the first missing piece
    /// or invalid configuration field.
    pub fn build(self) -> AuthKitResult<UserClient> {
        let config = self.config.ok_or_else(|| missing("config"))?;
        config.validate()?;
        let keystore = self.keystore.ok_or_else(|| missing("keystore"))?;
        let blob_store = self.blob_store.ok_or_else(|| missing("blob_store"))?;
        let biometric = self
            .biometric_sensor
            .ok_or_else(|| missing("biometric_sensor"))?;
        let device = self
            .device_status
            .ok_or_else(|| missing("device_status"))?;

        let config = Arc::new(config);
        let http = Arc::new(HttpClient::new());
        let gateway = Arc::new(ResourceGateway::new(
            Arc::clone(&http),
            config.resource_base_url.clone(),
        ));
        let tokens = TokenManager::new(Arc::clone(&http), Arc::clone(&config));
        let policy = PinPolicy::new(config.pin_policy.clone());
        let vault = Arc::new(CredentialVault::new(keystore, blob_store));

        Ok(UserClient {
            config,
            http,
            vault,
            gateway,
            tokens,
            policy,
            session: Arc::new(Mutex::new(Session::new())),
            flows: Arc::new(FlowRegistry::new()),
            biometric,
            device,
        })
    }
}

fn missing(field: &str) -> AuthKitError {
    AuthKitError::Configuration(format!("client builder is missing {field}"))
}

impl UserClient {
    pub(crate) fn begin_flow(
        &self,
        profile: Option<&ProfileId>,
        kind: FlowKind,
    ) -> Result<FlowGuard, PreconditionFailure> {
        self.flows.begin(profile, kind)
    }
}
