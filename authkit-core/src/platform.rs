//! Host platform capabilities injected at client construction.

use async_trait::async_trait;

/// Outcome of a biometric authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricVerdict {
    /// The sensor recognized the user.
    Granted,
    /// The user dismissed the prompt or the sensor rejected them.
    Denied,
    /// The sensor failed (hardware error, lockout).
    Failed,
}

/// Access to the device's biometric hardware.
#[async_trait]
pub trait BiometricSensor: Send + Sync {
    /// True when the device carries a biometric sensor.
    fn is_available(&self) -> bool;

    /// True when the OS has at least one biometric template enrolled.
    fn has_enrolled_biometrics(&self) -> bool;

    /// Prompts the user and resolves with the sensor's verdict.
    async fn authenticate(&self) -> BiometricVerdict;
}

/// Device integrity and version facts supplied by the host.
pub trait DeviceStatus: Send + Sync {
    /// OS version on a host-defined monotonic scale.
    fn os_version(&self) -> u32;

    /// True when the device is rooted or jailbroken.
    fn is_compromised(&self) -> bool;
}
