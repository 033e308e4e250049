//! PIN policy enforcement.

use thiserror::Error;

use crate::config::PinPolicyConfig;

/// A PIN policy violation. Checks run in a fixed order and the first failure
/// wins: malformed input (catch-all, reported once), blacklist, sequence,
/// similar digits, length.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PinPolicyViolation {
    /// The PIN appears on the configured blacklist.
    #[error("pin is blacklisted")]
    Blacklisted,

    /// The PIN is an ascending or descending digit sequence.
    #[error("pin must not be a sequence")]
    Sequence,

    /// The PIN repeats one digit more often than allowed.
    #[error("pin must not use the same digit more than {max_allowed} times")]
    SimilarDigits {
        /// Configured maximum number of occurrences of one digit.
        max_allowed: u32,
    },

    /// The PIN is shorter than the configured minimum.
    #[error("pin must be at least {min_length} digits long")]
    TooShort {
        /// Configured minimum PIN length.
        min_length: u32,
    },

    /// The candidate is empty or contains non-digit characters.
    #[error("pin must consist of digits only")]
    Malformed,
}

/// Validates candidate PINs against the configured constraints.
#[derive(Debug, Clone)]
pub struct PinPolicy {
    config: PinPolicyConfig,
}

impl PinPolicy {
    /// Creates a policy engine for `config`.
    #[must_use]
    pub fn new(config: PinPolicyConfig) -> Self {
        Self { config }
    }

    /// Minimum PIN length required by the policy.
    #[must_use]
    pub fn min_length(&self) -> u32 {
        self.config.min_length
    }

    /// Checks `pin` against all policy constraints.
    ///
    /// The blacklist check runs first so a blacklisted PIN is never reported
    /// as a weaker violation, then sequence, similar digits, and length.
    ///
    /// # Errors
    ///
    /// Returns the first [`PinPolicyViolation`] in check order.
    pub fn validate(&self, pin: &str) -> Result<(), PinPolicyViolation> {
        if pin.is_empty() || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PinPolicyViolation::Malformed);
        }
        if self.config.blacklist.contains(pin) {
            return Err(PinPolicyViolation::Blacklisted);
        }
        if self.config.disallow_sequences && is_sequence(pin) {
            return Err(PinPolicyViolation::Sequence);
        }
        if max_digit_occurrences(pin) > self.config.max_similar_digits {
            return Err(PinPolicyViolation::SimilarDigits {
                max_allowed: self.config.max_similar_digits,
            });
        }
        if (pin.len() as u32) < self.config.min_length {
            return Err(PinPolicyViolation::TooShort {
                min_length: self.config.min_length,
            });
        }
        Ok(())
    }
}

/// True if every step between adjacent digits is +1, or every step is -1.
fn is_sequence(pin: &str) -> bool {
    let digits: Vec<i16> = pin.bytes().map(|b| i16::from(b - b'0')).collect();
    if digits.len() < 2 {
        return false;
    }
    let ascending = digits.windows(2).all(|pair| pair[1] - pair[0] == 1);
    let descending = digits.windows(2).all(|pair| pair[0] - pair[1] == 1);
    ascending || descending
}

fn max_digit_occurrences(pin: &str) -> u32 {
    let mut counts = [0u32; 10];
    for b in pin.bytes() {
        counts[usize::from(b - b'0')] += 1;
    }
    counts.into_iter().max().unwrap_or(0)
}
