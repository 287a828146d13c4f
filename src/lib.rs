//! `vhll` estimates the number of distinct elements seen by each of many
//! independent logical streams ("flows") using Virtual HyperLogLog sketches:
//! one fixed-size register array is shared by every flow, and each flow's
//! smaller "virtual" register array is recomputed on demand by hashing the
//! flow identity into positions of the shared array.
//!
//! This keeps per-flow distinct counting space-efficient at millions of flows,
//! with no per-flow allocation at all, at the cost of cross-flow
//! register collisions, which the estimator removes statistically using the
//! whole-array cardinality estimate.
//!
//! ```rust
//! use vhll::VirtualHll;
//!
//! let mut sketch: VirtualHll = VirtualHll::with_precision(14)?;
//! for port in 0..10_000u32 {
//!     sketch.insert(b"10.0.0.1", &port.to_le_bytes());
//! }
//!
//! // Per-flow estimates can be slightly negative near zero; clamp at the edge.
//! let distinct = sketch.estimate_flow(b"10.0.0.1").max(0);
//! assert!(distinct > 8_000 && distinct < 12_000);
//! # Ok::<(), vhll::ConfigError>(())
//! ```
mod estimator;
mod errors;
mod hash;
mod index;
mod registers;
#[cfg(feature = "with_serde")]
mod serde;

pub use estimator::{VirtualHll, MAX_PRECISION, MIN_PRECISION, MIN_VIRTUAL_PRECISION};
pub use errors::{ConfigError, ValidationError};
pub use hash::{Hash64, WyHash64};
pub use index::MAX_RANK;
