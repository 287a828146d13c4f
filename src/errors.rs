//! ## Errors
//! Every failure the sketch can report is a synchronous configuration or
//! validation error, raised at construction, restore and merge time
//! ([`ConfigError`]) or at diagnostic-call time ([`ValidationError`]).
//! Insert and estimate operations never fail: every byte string is a valid
//! input and the hash capability is total.

use std::fmt;

/// Rejected sketch configuration.
///
/// When construction fails, no register storage has been allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Physical precision below the calibrated minimum.
    PrecisionTooLow { precision: u8, min: u8 },
    /// Physical precision above the supported maximum.
    PrecisionTooHigh { precision: u8, max: u8 },
    /// Virtual precision below its valid band.
    VirtualPrecisionTooLow { virtual_precision: u8, min: u8 },
    /// Virtual precision not strictly below the physical precision.
    VirtualPrecisionTooHigh { virtual_precision: u8, precision: u8 },
    /// Merge attempted between sketches with different configurations.
    ConfigMismatch { lhs: (u8, u8), rhs: (u8, u8) },
    /// Restored register bytes do not match the configured array size.
    RegisterLengthMismatch { len: usize, expected: usize },
    /// Restored register byte exceeds the maximum representable rank.
    RegisterValueOutOfRange { index: usize, value: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PrecisionTooLow { precision, min } => {
                write!(f, "precision {} is below the minimum {}", precision, min)
            }
            ConfigError::PrecisionTooHigh { precision, max } => {
                write!(f, "precision {} is above the maximum {}", precision, max)
            }
            ConfigError::VirtualPrecisionTooLow {
                virtual_precision,
                min,
            } => {
                write!(
                    f,
                    "virtual precision {} is below the minimum {}",
                    virtual_precision, min
                )
            }
            ConfigError::VirtualPrecisionTooHigh {
                virtual_precision,
                precision,
            } => {
                write!(
                    f,
                    "virtual precision {} must be strictly below precision {}",
                    virtual_precision, precision
                )
            }
            ConfigError::ConfigMismatch { lhs, rhs } => {
                write!(
                    f,
                    "cannot merge sketches with configurations {:?} and {:?}",
                    lhs, rhs
                )
            }
            ConfigError::RegisterLengthMismatch { len, expected } => {
                write!(f, "expected {} register bytes, got {}", expected, len)
            }
            ConfigError::RegisterValueOutOfRange { index, value } => {
                write!(f, "register {} holds invalid value {}", index, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Rejected diagnostic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Histogram buffer cannot hold one bin per representable register value.
    BufferTooSmall { len: usize, required: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BufferTooSmall { len, required } => {
                write!(
                    f,
                    "distribution buffer holds {} bins, {} required",
                    len, required
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}
