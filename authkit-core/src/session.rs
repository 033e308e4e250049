//! The in-process session.

use tracing::debug;

use authkit_vault::UserProfile;

use crate::token::{AccessToken, AuthorizationState};

/// Ephemeral per-process session state: current profile, access token,
/// authorization state, and the device push token.
///
/// Exactly one session exists per [`crate::UserClient`]; it lives behind a
/// single async mutex.
pub(crate) struct Session {
    profile: Option<UserProfile>,
    access_token: Option<AccessToken>,
    state: AuthorizationState,
    push_token: Option<String>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            profile: None,
            access_token: None,
            state: AuthorizationState::Unauthenticated,
            push_token: None,
        }
    }

    /// Current authorization state. A held-but-expired token reads as
    /// `Expired`.
    pub(crate) fn state(&self) -> AuthorizationState {
        match (self.state, &self.access_token) {
            (AuthorizationState::Authorized, Some(token)) if token.is_expired() => {
                AuthorizationState::Expired
            }
            (AuthorizationState::Authorized, None) => {
                AuthorizationState::Unauthenticated
            }
            (state, _) => state,
        }
    }

    pub(crate) fn is_authorized(&self) -> bool {
        self.state() == AuthorizationState::Authorized
    }

    pub(crate) fn is_authorized_for(&self, profile_id: &authkit_vault::ProfileId) -> bool {
        self.is_authorized()
            && self.profile.as_ref().is_some_and(|p| p.id == *profile_id)
    }

    pub(crate) fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub(crate) fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    /// `Authorization` header for the current token, `None` when missing or
    /// expired.
    pub(crate) fn authorization_header(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .filter(|token| !token.is_expired())
            .map(AccessToken::header_value)
    }

    pub(crate) fn push_token(&self) -> Option<&String> {
        self.push_token.as_ref()
    }

    pub(crate) fn set_push_token(&mut self, token: Option<String>) {
        self.push_token = token;
    }

    /// `Unauthenticated | Expired → Authenticating`.
    pub(crate) fn begin_authentication(&mut self) {
        self.transition(AuthorizationState::Authenticating);
    }

    /// `Authenticating → Authorized` with a fresh token.
    pub(crate) fn authorize(&mut self, profile: UserProfile, token: AccessToken) {
        self.profile = Some(profile);
        self.access_token = Some(token);
        self.transition(AuthorizationState::Authorized);
    }

    /// Terminal failure of an authentication flow: back to `Unauthenticated`.
    pub(crate) fn fail_authentication(&mut self) {
        self.access_token = None;
        self.transition(AuthorizationState::Unauthenticated);
    }

    /// Marks the held token as rejected by the server (401-equivalent).
    pub(crate) fn mark_expired(&mut self) {
        if self.access_token.is_some() {
            self.transition(AuthorizationState::Expired);
        }
    }

    /// Logout: drops the access token only and returns the profile that was
    /// signed in. Refresh token and client credentials stay in the vault.
    pub(crate) fn invalidate(&mut self) -> Option<UserProfile> {
        let profile = self.profile.take()?;
        self.access_token = None;
        self.transition(AuthorizationState::Unauthenticated);
        Some(profile)
    }

    /// Full reset after deregistration of the current profile. The push
    /// token is device-scoped and survives.
    pub(crate) fn reset(&mut self) {
        self.profile = None;
        self.access_token = None;
        self.transition(AuthorizationState::Unauthenticated);
    }

    fn transition(&mut self, next: AuthorizationState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session state transition");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn token(expires_in: Duration) -> AccessToken {
        AccessToken::new("token".to_string(), expires_in)
    }

    #[test]
    fn fresh_session_is_unauthenticated() {
        let session = Session::new();
        assert_eq!(session.state(), AuthorizationState::Unauthenticated);
        assert!(!session.is_authorized());
        assert!(session.authorization_header().is_none());
    }

    #[test]
    fn authorize_then_logout() {
        let mut session = Session::new();
        let profile = UserProfile::new("Test", 0);
        session.begin_authentication();
        assert_eq!(session.state(), AuthorizationState::Authenticating);

        session.authorize(profile.clone(), token(Duration::from_secs(60)));
        assert!(session.is_authorized());
        assert!(session.is_authorized_for(&profile.id));
        assert_eq!(
            session.authorization_header().as_deref(),
            Some("Bearer token")
        );

        let out = session.invalidate().expect("profile present");
        assert_eq!(out.id, profile.id);
        assert_eq!(session.state(), AuthorizationState::Unauthenticated);
        assert!(session.invalidate().is_none());
    }

    #[test]
    fn expired_token_reads_as_expired() {
        let mut session = Session::new();
        session.begin_authentication();
        session.authorize(UserProfile::new("Test", 0), token(Duration::ZERO));
        assert_eq!(session.state(), AuthorizationState::Expired);
        assert!(!session.is_authorized());
        assert!(session.authorization_header().is_none());
    }

    #[test]
    fn push_token_survives_reset() {
        let mut session = Session::new();
        session.set_push_token(Some("apns-token".to_string()));
        session.begin_authentication();
        session.authorize(UserProfile::new("Test", 0), token(Duration::from_secs(60)));
        session.reset();
        assert_eq!(session.push_token().map(String::as_str), Some("apns-token"));
        assert_eq!(session.state(), AuthorizationState::Unauthenticated);
    }
}
