//! Flow mutual exclusion.
//!
//! Each (profile, flow kind) pair may run at most once concurrently. A flow
//! claims its slot at entry and releases it through an RAII guard, so every
//! exit path (success, error, cancellation, panic) frees the slot.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use authkit_vault::ProfileId;

use crate::error::PreconditionFailure;

/// Kind of user-facing flow, used for mutual exclusion and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FlowKind {
    /// New profile registration.
    Registration,
    /// PIN or biometric authentication.
    Authentication,
    /// PIN change.
    PinChange,
    /// Biometric enrollment.
    BiometricEnrollment,
    /// Mobile authentication enrollment.
    MobileAuthEnrollment,
    /// Profile removal.
    Deregistration,
}

type FlowKey = (Option<ProfileId>, FlowKind);

/// Tracks the flows currently in progress.
pub(crate) struct FlowRegistry {
    active: Mutex<HashSet<FlowKey>>,
}

impl FlowRegistry {
    pub(crate) fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Claims the slot for `kind` on `profile`. Registration runs before a
    /// profile exists and is keyed process-wide with `None`.
    pub(crate) fn begin(
        self: &Arc<Self>,
        profile: Option<&ProfileId>,
        kind: FlowKind,
    ) -> Result<FlowGuard, PreconditionFailure> {
        let key = (profile.cloned(), kind);
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !active.insert(key.clone()) {
            return Err(PreconditionFailure::AlreadyInProgress(kind));
        }
        Ok(FlowGuard {
            registry: Arc::clone(self),
            key,
        })
    }
}

/// Releases the claimed flow slot on drop.
pub(crate) struct FlowGuard {
    registry: Arc<FlowRegistry>,
    key: FlowKey,
}

impl Drop for FlowGuard {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
