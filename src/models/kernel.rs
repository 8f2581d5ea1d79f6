//! Kernel model.
//!
//! A kernel is the atomic unit of work in a campaign: a span of time plus
//! simultaneous demand on two shared resources, compute capacity and
//! memory/interconnect bandwidth.
//!
//! # Work Model
//!
//! Utilizations are dimensionless fractions of full capacity. The work a
//! kernel performs on a resource is `duration × utilization`:
//! - [`Kernel::dilate`] preserves work (slower rate, longer duration).
//! - [`Kernel::scale_duration`] changes work (finer-grained tile of the
//!   same per-call rate).
//!
//! # Lineage
//! Every kernel carries an [`OriginId`]. Fresh kernels get a new one;
//! clones and split fragments inherit it, so downstream consumers can
//! associate fragments with the kernel they came from.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

/// Tolerance for comparing time points.
///
/// Split points and re-stacked starts are computed, so two times that
/// denote the same instant may differ in the last bits.
pub const TIME_EPSILON: f64 = 1e-9;

/// Tolerance for comparing summed utilizations against capacity.
pub const UTIL_EPSILON: f64 = 1e-9;

/// Whether two time points denote the same instant.
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Identity of the kernel a fragment was ultimately derived from.
///
/// Identity only: it is never dereferenced and mutating a fragment never
/// touches the kernel its origin names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginId(Uuid);

impl OriginId {
    /// Allocates a fresh lineage.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OriginId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work with a time span and two utilization demands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    /// Kernel name. `None` for an anonymous spacer.
    pub name: Option<String>,
    /// Start time.
    pub start: f64,
    /// Duration (≥ 0).
    pub duration: f64,
    /// Fraction of compute capacity in use while running.
    pub compute_util: f64,
    /// Fraction of bandwidth capacity in use while running.
    pub bw_util: f64,
    /// Bandwidth cap hint. Scaled by dilation, reset on split.
    pub bw_util_limit: f64,
    /// Portion of `duration` added by throttling.
    pub throttled_duration: f64,
    /// Lineage of this fragment.
    pub origin: OriginId,
}

impl Kernel {
    /// Creates a kernel starting at 0 with a fresh origin.
    pub fn new(name: impl Into<String>, duration: f64, compute_util: f64, bw_util: f64) -> Self {
        Self {
            name: Some(name.into()),
            start: 0.0,
            duration,
            compute_util,
            bw_util,
            bw_util_limit: 1.0,
            throttled_duration: 0.0,
            origin: OriginId::new(),
        }
    }

    /// Creates a zero-duration, zero-utilization placeholder.
    pub fn spacer(name: Option<String>) -> Self {
        Self {
            name,
            start: 0.0,
            duration: 0.0,
            compute_util: 0.0,
            bw_util: 0.0,
            bw_util_limit: 1.0,
            throttled_duration: 0.0,
            origin: OriginId::new(),
        }
    }

    /// Sets the start time.
    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    /// Sets the bandwidth cap hint.
    pub fn with_bw_util_limit(mut self, limit: f64) -> Self {
        self.bw_util_limit = limit;
        self
    }

    /// Attaches the kernel to an existing lineage.
    pub fn with_origin(mut self, origin: OriginId) -> Self {
        self.origin = origin;
        self
    }

    /// End time (`start + duration`).
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Repositions the kernel. No ordering checks are made.
    pub fn set_start(&mut self, start: f64) -> &mut Self {
        self.start = start;
        self
    }

    /// Whether this kernel occupies no time.
    #[inline]
    pub fn is_spacer(&self) -> bool {
        self.duration == 0.0
    }

    /// Name for display, `"-"` when anonymous.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }

    /// Compute work (`duration × compute_util`).
    #[inline]
    pub fn compute_work(&self) -> f64 {
        self.duration * self.compute_util
    }

    /// Bandwidth work (`duration × bw_util`).
    #[inline]
    pub fn bw_work(&self) -> f64 {
        self.duration * self.bw_util
    }

    /// Copy of this kernel starting a new lineage.
    pub fn detached(&self) -> Self {
        Self {
            origin: OriginId::new(),
            ..self.clone()
        }
    }

    /// Multiplies the duration, leaving utilizations unchanged.
    ///
    /// Used for tiling: a `1/n` tile runs at the same rate for `1/n` of
    /// the time.
    pub fn scale_duration(&mut self, factor: f64) -> CampaignResult<&mut Self> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(CampaignError::InvalidArgument(format!(
                "duration scale factor must be finite and non-negative, got {factor}"
            )));
        }
        self.duration *= factor;
        Ok(self)
    }

    /// Stretches the duration by `factor` and divides utilizations by it.
    ///
    /// `duration × compute_util` and `duration × bw_util` are invariant.
    pub fn dilate(&mut self, factor: f64) -> CampaignResult<&mut Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CampaignError::InvalidArgument(format!(
                "dilation factor must be finite and positive, got {factor}"
            )));
        }
        let inverse = 1.0 / factor;
        self.duration *= factor;
        self.compute_util *= inverse;
        self.bw_util *= inverse;
        self.bw_util_limit *= inverse;
        Ok(self)
    }

    /// Splits the kernel at absolute time `at`.
    ///
    /// Returns `(clone, None)` when `at` is not strictly inside the span.
    /// Otherwise returns the `[start, at)` and `[at, end)` fragments. Both
    /// keep name, origin and utilizations; `throttled_duration` and
    /// `bw_util_limit` fall back to their defaults.
    pub fn split(&self, at: f64) -> (Kernel, Option<Kernel>) {
        let end = self.end();
        if at <= self.start || at >= end || approx_eq(at, self.start) || approx_eq(at, end) {
            return (self.clone(), None);
        }

        let fragment = |start: f64, duration: f64| Kernel {
            name: self.name.clone(),
            start,
            duration,
            compute_util: self.compute_util,
            bw_util: self.bw_util,
            bw_util_limit: 1.0,
            throttled_duration: 0.0,
            origin: self.origin,
        };

        let head = fragment(self.start, at - self.start);
        let tail = fragment(at, end - at);
        (head, Some(tail))
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Kernel(name={}, start={:.2}, duration={:.2}, compute_util={:.2}, bw_util={:.2}, throttled={:.2})",
            self.display_name(),
            self.start,
            self.duration,
            self.compute_util,
            self.bw_util,
            self.throttled_duration
        )
    }
}

/// Caller-supplied kernel description.
///
/// The deserializable input record; [`KernelSpec::into_kernel`] turns it
/// into a fresh [`Kernel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Kernel name (`None` for a spacer).
    #[serde(default)]
    pub name: Option<String>,
    /// Duration.
    pub duration: f64,
    /// Compute utilization.
    pub compute_util: f64,
    /// Bandwidth utilization.
    pub bw_util: f64,
    /// Explicit start. Defaults to 0.
    #[serde(default)]
    pub start: Option<f64>,
    /// Bandwidth cap hint. Defaults to 1.0.
    #[serde(default)]
    pub bw_util_limit: Option<f64>,
}

impl KernelSpec {
    /// Creates a construction record with no explicit start.
    pub fn new(name: impl Into<String>, duration: f64, compute_util: f64, bw_util: f64) -> Self {
        Self {
            name: Some(name.into()),
            duration,
            compute_util,
            bw_util,
            start: None,
            bw_util_limit: None,
        }
    }

    /// Builds a kernel with a fresh origin.
    pub fn into_kernel(self) -> Kernel {
        Kernel {
            name: self.name,
            start: self.start.unwrap_or(0.0),
            duration: self.duration,
            compute_util: self.compute_util,
            bw_util: self.bw_util,
            bw_util_limit: self.bw_util_limit.unwrap_or(1.0),
            throttled_duration: 0.0,
            origin: OriginId::new(),
        }
    }
}

impl From<KernelSpec> for Kernel {
    fn from(spec: KernelSpec) -> Self {
        spec.into_kernel()
    }
}
