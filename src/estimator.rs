//! ## Virtual HyperLogLog estimator
//! Tracks per-flow distinct counts across millions of flows without one
//! HyperLogLog structure per flow. Every flow logically owns a virtual
//! register array of `s = 2^virtual_precision` slots which is never stored:
//! each slot is mapped on demand to one of the `m = 2^precision` registers of
//! a single shared physical array.
//!
//! # Estimation
//! Both the whole-array ("total") and per-flow estimates use the classic
//! piecewise HyperLogLog formula: raw harmonic-mean estimate
//! `alpha(n) * n^2 / sum`, switching to linear counting when the raw estimate
//! falls at or below `2.5 * n` and zero registers remain. The same family is
//! used in both places on purpose: the cross-flow noise correction subtracts
//! one estimate from the other and relies on their biases cancelling.
//!
//! # Noise correction
//! A flow's reconstructed registers are contaminated by ranks written by
//! other flows that map to the same physical slots. The expected
//! contamination per unit of virtual space is `N_total / m`, so the raw
//! virtual estimate is corrected with the whole-array estimate:
//!
//! - `virtual_precision >= precision - 6`: the flow's share of the array is
//!   large and the `m*s/(m-s)` scale factor is unstable, so the expected
//!   noise `N_total * s / m` is subtracted directly.
//! - otherwise: `(m*s/(m-s)) * (vE/s - N_total/m)`, optionally rescaled by
//!   the ratio of a caller-supplied near-exact total to the sketch's own
//!   (see [`VirtualHll::estimate_flow_with_total`]).
//!
//! Corrected per-flow estimates can come out slightly negative for flows with
//! near-zero true cardinality; callers should clamp to 0.
//!
//! # Concurrency
//! All mutation goes through `&mut self`: concurrent writers need external
//! serialization, or one sketch per shard combined with [`VirtualHll::merge`]
//! once the producers stop. Readers tolerate stale registers because every
//! register is monotonically non-decreasing: any observed value is a valid
//! lower bound.

use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

use crate::errors::{ConfigError, ValidationError};
use crate::hash::{Hash64, WyHash64};
use crate::index::{physical_index, slot_and_rank, MAX_RANK};
use crate::registers::RegisterSet;

/// Smallest physical precision the estimation formulas are calibrated for.
pub const MIN_PRECISION: u8 = 7;
/// Largest physical precision (2^30 registers, 1 GiB of state).
pub const MAX_PRECISION: u8 = 30;
/// Smallest virtual precision: `alpha` is defined from 16 registers up.
pub const MIN_VIRTUAL_PRECISION: u8 = 4;

/// Offset used by [`VirtualHll::with_precision`] to derive the virtual
/// precision, and the boundary between the two noise-correction regimes.
const VIRTUAL_PRECISION_OFFSET: u8 = 6;
/// Seed for element hashing.
const ELEMENT_SEED: u64 = 0xc3a5_c85c_97cb_3127;
/// Seed for flow-identity hashing, distinct from the element seed so that a
/// byte string used both as flow and element does not correlate.
const FLOW_SEED: u64 = 0xb492_b66f_be98_f273;
/// Sanity clamp on the external-total rescale, expressed as a multiple of the
/// naive noise mean `N_total * s / m`. Heuristic; the exact constant is not
/// load-bearing.
const NOISE_CLAMP: f64 = 1.2;

/// Per-flow cardinality estimator over one shared register array.
///
/// Flows exist only as hash inputs; there is no per-flow state. Construction
/// parameters are immutable for the sketch's lifetime; [`VirtualHll::reset`]
/// zeroes the registers back to the initial state.
pub struct VirtualHll<H: Hash64 = WyHash64> {
    registers: RegisterSet,
    precision: u8,
    virtual_precision: u8,
    hasher: PhantomData<H>,
}

impl VirtualHll {
    /// Create a sketch with `2^precision` physical registers and
    /// `2^virtual_precision` virtual slots per flow.
    ///
    /// Fails without allocating register storage when `precision` is outside
    /// `[MIN_PRECISION, MAX_PRECISION]` or `virtual_precision` is outside
    /// `[MIN_VIRTUAL_PRECISION, precision)`.
    pub fn new(precision: u8, virtual_precision: u8) -> Result<Self, ConfigError> {
        Self::new_with_hasher(precision, virtual_precision)
    }

    /// Create a sketch deriving the virtual precision as `precision - 6`.
    ///
    /// Fails when the derived virtual precision falls outside its valid band.
    pub fn with_precision(precision: u8) -> Result<Self, ConfigError> {
        Self::new(
            precision,
            precision.saturating_sub(VIRTUAL_PRECISION_OFFSET),
        )
    }

    /// Create a sketch targeting a relative standard deviation for the
    /// per-flow estimates. Smaller values require more space.
    pub fn with_relative_error(rsd: f64) -> Result<Self, ConfigError> {
        let precision = (1.106 / rsd).powi(2).log2() as u8;
        Self::with_precision(precision)
    }

    /// Restore a sketch from register bytes previously obtained through
    /// [`VirtualHll::registers`] (flat one-byte-per-register layout).
    pub fn from_registers(
        precision: u8,
        virtual_precision: u8,
        bytes: Vec<u8>,
    ) -> Result<Self, ConfigError> {
        Self::from_registers_with_hasher(precision, virtual_precision, bytes)
    }
}

impl<H: Hash64> VirtualHll<H> {
    /// Create a sketch with a custom [`Hash64`] capability.
    pub fn new_with_hasher(precision: u8, virtual_precision: u8) -> Result<Self, ConfigError> {
        validate_config(precision, virtual_precision)?;
        Ok(Self {
            registers: RegisterSet::new(1 << precision),
            precision,
            virtual_precision,
            hasher: PhantomData,
        })
    }

    /// Restore a sketch with a custom [`Hash64`] capability.
    pub fn from_registers_with_hasher(
        precision: u8,
        virtual_precision: u8,
        bytes: Vec<u8>,
    ) -> Result<Self, ConfigError> {
        validate_config(precision, virtual_precision)?;
        let expected = 1usize << precision;
        if bytes.len() != expected {
            return Err(ConfigError::RegisterLengthMismatch {
                len: bytes.len(),
                expected,
            });
        }
        if let Some(index) = bytes.iter().position(|&v| v > MAX_RANK) {
            return Err(ConfigError::RegisterValueOutOfRange {
                index,
                value: bytes[index],
            });
        }
        Ok(Self {
            registers: RegisterSet::from_bytes(bytes),
            precision,
            virtual_precision,
            hasher: PhantomData,
        })
    }

    /// Physical precision (log2 of the shared array size).
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Virtual precision (log2 of each flow's virtual array size).
    #[inline]
    pub fn virtual_precision(&self) -> u8 {
        self.virtual_precision
    }

    /// Flat one-byte-per-register view of the shared array (index = physical
    /// slot). This layout is the only persisted-state contract; see
    /// [`VirtualHll::from_registers`].
    #[inline]
    pub fn registers(&self) -> &[u8] {
        self.registers.as_bytes()
    }

    /// Number of physical registers `m`.
    #[inline]
    fn physical_m(&self) -> usize {
        1 << self.precision
    }

    /// Number of virtual slots `s` per flow.
    #[inline]
    fn virtual_m(&self) -> usize {
        1 << self.virtual_precision
    }

    #[inline]
    fn physical_mask(&self) -> u64 {
        (self.physical_m() - 1) as u64
    }

    /// Record one element observation for `flow`.
    ///
    /// Hashes the element, splits the hash into a virtual slot and a rank,
    /// maps the slot to a physical register through the flow identity, and
    /// raises that register if the rank exceeds it. Returns whether a register
    /// changed; repeated identical `(flow, element)` pairs report `false`
    /// after the first call. Never fails: every byte string is a valid input.
    #[inline]
    pub fn insert(&mut self, flow: &[u8], element: &[u8]) -> bool {
        let element_hash = H::hash_with_seed(element, ELEMENT_SEED);
        let (slot, rank) = slot_and_rank(element_hash, self.virtual_precision);
        let flow_hash = H::hash_with_seed(flow, FLOW_SEED);
        let idx = physical_index::<H>(flow_hash, slot, self.physical_mask());
        self.registers.update_if_greater(idx, rank)
    }

    /// Estimate the number of distinct `(flow, element)` pairs inserted,
    /// treating the whole physical array as one sketch of size `m`.
    ///
    /// An empty or just-reset sketch estimates exactly 0.
    pub fn estimate_total(&self) -> u64 {
        let (sum, zeros) = harmonic_sum(self.registers.as_bytes());
        let estimate = piecewise_estimate(self.physical_m(), sum, zeros);
        (estimate + 0.5) as u64
    }

    /// Estimate the number of distinct elements inserted for `flow`.
    ///
    /// Reconstructs the flow's virtual register snapshot through the indexer,
    /// estimates its cardinality and removes the expected cross-flow noise
    /// using the sketch's own total estimate. May legitimately be 0 for an
    /// unseen flow, and slightly negative for near-zero true cardinalities;
    /// callers should clamp to 0 rather than propagate negative counts.
    pub fn estimate_flow(&self, flow: &[u8]) -> i64 {
        self.corrected_flow_estimate(flow, None)
    }

    /// [`VirtualHll::estimate_flow`] with a near-exact total element count
    /// obtained out of band (for deployments that keep an exact side counter).
    ///
    /// In the direct-subtraction regime the supplied total replaces the
    /// sketch's own total estimate in the noise term. In the scaled regime
    /// the corrected value is additionally rescaled by the ratio of the
    /// supplied total to the sketch's own; the rescale is dropped again when
    /// it pushes the result above 1.2 times the naive noise mean.
    pub fn estimate_flow_with_total(&self, flow: &[u8], total: u64) -> i64 {
        self.corrected_flow_estimate(flow, Some(total))
    }

    fn corrected_flow_estimate(&self, flow: &[u8], reference_total: Option<u64>) -> i64 {
        let m = self.physical_m() as f64;
        let s = self.virtual_m() as f64;
        let virtual_estimate = self.virtual_estimate(flow);
        let total_estimate = self.estimate_total() as f64;

        if self.virtual_precision >= self.precision - VIRTUAL_PRECISION_OFFSET {
            let total = reference_total.map_or(total_estimate, |t| t as f64);
            return (virtual_estimate - total * s / m).round() as i64;
        }

        let corrected = (m * s / (m - s)) * (virtual_estimate / s - total_estimate / m);
        match reference_total {
            Some(total) if total_estimate > 0.0 => {
                let rescaled = corrected * (total as f64 / total_estimate);
                let noise_mean = total_estimate * s / m;
                if rescaled > NOISE_CLAMP * noise_mean {
                    corrected.round() as i64
                } else {
                    rescaled.round() as i64
                }
            }
            _ => corrected.round() as i64,
        }
    }

    /// Raw cardinality estimate of the flow's reconstructed virtual snapshot,
    /// before noise correction.
    fn virtual_estimate(&self, flow: &[u8]) -> f64 {
        let flow_hash = H::hash_with_seed(flow, FLOW_SEED);
        let mask = self.physical_mask();
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for slot in 0..self.virtual_m() {
            let value = self
                .registers
                .get(physical_index::<H>(flow_hash, slot, mask));
            sum += 1.0 / (1u64 << value) as f64;
            zeros += usize::from(value == 0);
        }
        piecewise_estimate(self.virtual_m(), sum, zeros)
    }

    /// Zero every register, returning the sketch to its initial state. The
    /// next insert re-activates it; configuration is unchanged.
    pub fn reset(&mut self) {
        self.registers.reset();
    }

    /// Combine another sketch built with the identical configuration into
    /// this one by elementwise register max.
    ///
    /// Commutative and idempotent; merging sketches with different
    /// `(precision, virtual_precision)` configurations is rejected.
    pub fn merge(&mut self, rhs: &Self) -> Result<(), ConfigError> {
        if self.precision != rhs.precision || self.virtual_precision != rhs.virtual_precision {
            return Err(ConfigError::ConfigMismatch {
                lhs: (self.precision, self.virtual_precision),
                rhs: (rhs.precision, rhs.virtual_precision),
            });
        }
        self.registers.merge(&rhs.registers);
        Ok(())
    }

    /// Fill `buf` with a per-value histogram of the physical registers
    /// (diagnostics and testing only). `buf[v]` receives the number of
    /// registers holding value `v`; bins past [`MAX_RANK`] are zeroed.
    ///
    /// Fails when `buf` cannot hold one bin per representable value.
    pub fn register_value_distribution(&self, buf: &mut [u64]) -> Result<(), ValidationError> {
        let required = usize::from(MAX_RANK) + 1;
        if buf.len() < required {
            return Err(ValidationError::BufferTooSmall {
                len: buf.len(),
                required,
            });
        }
        buf.fill(0);
        for &value in self.registers.as_bytes() {
            buf[usize::from(value)] += 1;
        }
        Ok(())
    }
}

impl<H: Hash64> Clone for VirtualHll<H> {
    fn clone(&self) -> Self {
        Self {
            registers: self.registers.clone(),
            precision: self.precision,
            virtual_precision: self.virtual_precision,
            hasher: PhantomData,
        }
    }
}

impl<H: Hash64> PartialEq for VirtualHll<H> {
    /// Sketches compare equal when both configuration and register contents
    /// match; equal sketches produce identical estimates for every flow.
    fn eq(&self, rhs: &Self) -> bool {
        self.precision == rhs.precision
            && self.virtual_precision == rhs.virtual_precision
            && self.registers == rhs.registers
    }
}

impl<H: Hash64> Debug for VirtualHll<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VirtualHll {{ precision: {}, virtual_precision: {}, total_estimate: {} }}",
            self.precision,
            self.virtual_precision,
            self.estimate_total()
        )
    }
}

/// Validate a `(precision, virtual_precision)` pair before any allocation.
fn validate_config(precision: u8, virtual_precision: u8) -> Result<(), ConfigError> {
    if precision < MIN_PRECISION {
        return Err(ConfigError::PrecisionTooLow {
            precision,
            min: MIN_PRECISION,
        });
    }
    if precision > MAX_PRECISION {
        return Err(ConfigError::PrecisionTooHigh {
            precision,
            max: MAX_PRECISION,
        });
    }
    if virtual_precision < MIN_VIRTUAL_PRECISION {
        return Err(ConfigError::VirtualPrecisionTooLow {
            virtual_precision,
            min: MIN_VIRTUAL_PRECISION,
        });
    }
    if virtual_precision >= precision {
        return Err(ConfigError::VirtualPrecisionTooHigh {
            virtual_precision,
            precision,
        });
    }
    Ok(())
}

/// Harmonic sum `Σ 2^-value` and zero-register count over a register slice.
fn harmonic_sum(values: &[u8]) -> (f64, usize) {
    let mut sum = 0.0;
    let mut zeros = 0usize;
    for &value in values {
        sum += 1.0 / (1u64 << value) as f64;
        zeros += usize::from(value == 0);
    }
    (sum, zeros)
}

/// Classic piecewise HyperLogLog estimate for an array of `n` registers.
///
/// Raw harmonic-mean estimate with the small-range linear-counting switch;
/// an all-zero array estimates 0 through the linear-counting branch.
fn piecewise_estimate(n: usize, sum: f64, zeros: usize) -> f64 {
    let n_f = n as f64;
    let raw = alpha(n) * n_f * n_f / sum;
    if raw <= 2.5 * n_f && zeros > 0 {
        n_f * (n_f / zeros as f64).ln()
    } else {
        raw
    }
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}
