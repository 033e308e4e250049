//! Authenticated resource fetching.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use authkit_vault::CredentialVault;

use crate::client::UserClient;
use crate::error::AuthFailure;
use crate::gateway::{RequestId, ResourceGateway, ResourceRequest, ResourceResponse};
use crate::observer::ResourceDelegate;
use crate::session::Session;
use crate::token::TokenManager;
use crate::AuthKitResult;

impl UserClient {
    /// Fetches a resource on behalf of the signed-in user.
    ///
    /// Runs in the background and delivers the outcome to `delegate` exactly
    /// once, correlated by the returned [`RequestId`]. A missing or expired
    /// access token triggers at most one silent refresh per request; a 401
    /// that survives the refreshed token surfaces as
    /// [`AuthFailure::Expired`]. Must be called within a Tokio runtime.
    pub fn fetch_resource(
        &self,
        request: ResourceRequest,
        delegate: Arc<dyn ResourceDelegate>,
    ) -> RequestId {
        let request_id = RequestId::generate();
        let task = ResourceTask {
            gateway: Arc::clone(&self.gateway),
            session: Arc::clone(&self.session),
            tokens: self.tokens.clone(),
            vault: Arc::clone(&self.vault),
        };
        tokio::spawn(async move {
            let outcome = task.run(&request).await;
            delegate.on_response(request_id, outcome);
        });
        request_id
    }
}

struct ResourceTask {
    gateway: Arc<ResourceGateway>,
    session: Arc<Mutex<Session>>,
    tokens: TokenManager,
    vault: Arc<CredentialVault>,
}

impl ResourceTask {
    async fn run(&self, request: &ResourceRequest) -> AuthKitResult<ResourceResponse> {
        let held = self.session.lock().await.authorization_header();
        let (authorization, refreshed) = match held {
            Some(header) => (header, false),
            // No usable token: the per-request refresh budget is spent up
            // front.
            None => (self.silent_refresh().await?, true),
        };

        let response = self.gateway.execute(request, &authorization).await?;
        if response.status != 401 {
            return Ok(response);
        }
        self.session.lock().await.mark_expired();
        if refreshed {
            return Err(AuthFailure::Expired.into());
        }

        debug!(path = %request.path, "token rejected, refreshing once");
        let authorization = self.silent_refresh().await?;
        let response = self.gateway.execute(request, &authorization).await?;
        if response.status == 401 {
            self.session.lock().await.mark_expired();
            return Err(AuthFailure::Expired.into());
        }
        Ok(response)
    }

    /// Renews the access token through the refresh-token grant without user
    /// interaction. Any failure surfaces as an expired session.
    async fn silent_refresh(&self) -> AuthKitResult<String> {
        let profile = {
            let session = self.session.lock().await;
            session.profile().cloned().ok_or(AuthFailure::Expired)?
        };
        let credentials = self
            .vault
            .retrieve(&profile.id)?
            .filter(|credentials| credentials.refresh_token.is_some())
            .ok_or(AuthFailure::Expired)?;

        let (token, rotated) = self.tokens.acquire(&credentials).await?;
        if let Some(refresh_token) = rotated {
            self.vault.update(&profile.id, |record| {
                record.refresh_token = Some(refresh_token);
            })?;
        }

        let header = token.header_value();
        self.session.lock().await.authorize(profile, token);
        Ok(header)
    }
}
