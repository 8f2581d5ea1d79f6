//! Campaign domain models.
//!
//! Provides the core data types for describing kernel campaigns: the
//! kernels themselves, the flat intervals a timeline is cut into, and the
//! soft notices raised when demand exceeds capacity.
//!
//! # Resource Model
//!
//! | Field | Meaning | Capacity |
//! |-------|---------|----------|
//! | `compute_util` | Fraction of compute in use | 1.0 |
//! | `bw_util` | Fraction of memory/interconnect bandwidth in use | 1.0 |
//!
//! Sums across concurrent kernels may exceed capacity until the schedule
//! is throttled.

mod interval;
mod kernel;
mod notice;

pub use interval::Interval;
pub use kernel::{approx_eq, Kernel, KernelSpec, OriginId, TIME_EPSILON, UTIL_EPSILON};
pub use notice::{ResourceKind, UtilizationNotice};
