//! Interval model.
//!
//! An interval is one flat segment of the timeline: every fragment it holds
//! starts and ends at the same instants, so the set of active kernels is
//! constant across it. Intervals are only built by the partitioning
//! algorithm in [`crate::partition`].

use std::fmt;

use serde::Serialize;
use tracing::error;

use super::kernel::{approx_eq, Kernel, UTIL_EPSILON};
use super::notice::{ResourceKind, UtilizationNotice};
use crate::error::{CampaignError, CampaignResult};

/// A maximal segment with a uniform set of active kernel fragments.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interval {
    kernels: Vec<Kernel>,
}

impl Interval {
    /// Builds an interval, checking that all fragments are aligned.
    pub fn new(kernels: Vec<Kernel>) -> CampaignResult<Self> {
        let interval = Self { kernels };
        interval.check()?;
        Ok(interval)
    }

    /// Validates the uniform-start/uniform-end invariant.
    ///
    /// A failure means the partitioning is wrong; it is logged at error
    /// level and returned.
    pub fn check(&self) -> CampaignResult<()> {
        let Some(first) = self.kernels.first() else {
            error!("Broken interval: no kernels");
            return Err(CampaignError::BrokenInterval(
                "interval has no kernels".to_string(),
            ));
        };

        let (start, end) = (first.start, first.end());
        for kernel in &self.kernels[1..] {
            if !approx_eq(kernel.start, start) {
                error!(expected = start, found = %kernel, "Broken interval (starts)");
                return Err(CampaignError::BrokenInterval(format!(
                    "start {:.6} of {} differs from {:.6}",
                    kernel.start,
                    kernel.display_name(),
                    start
                )));
            }
            if !approx_eq(kernel.end(), end) {
                error!(expected = end, found = %kernel, "Broken interval (ends)");
                return Err(CampaignError::BrokenInterval(format!(
                    "end {:.6} of {} differs from {:.6}",
                    kernel.end(),
                    kernel.display_name(),
                    end
                )));
            }
        }
        Ok(())
    }

    /// Shared start of the fragments.
    pub fn start(&self) -> f64 {
        self.kernels.first().map_or(0.0, |k| k.start)
    }

    /// Shared end of the fragments.
    pub fn end(&self) -> f64 {
        self.kernels.first().map_or(0.0, Kernel::end)
    }

    /// Length of the segment.
    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Always `false` for an interval built through [`Interval::new`].
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Fragments in this interval.
    pub fn kernels(&self) -> &[Kernel] {
        &self.kernels
    }

    /// Iterates over the fragments.
    pub fn iter(&self) -> std::slice::Iter<'_, Kernel> {
        self.kernels.iter()
    }

    /// Consumes the interval, yielding its fragments.
    pub fn into_kernels(self) -> Vec<Kernel> {
        self.kernels
    }

    /// Concurrent compute demand.
    pub fn total_compute_util(&self) -> f64 {
        self.kernels.iter().map(|k| k.compute_util).sum()
    }

    /// Concurrent bandwidth demand.
    pub fn total_bw_util(&self) -> f64 {
        self.kernels.iter().map(|k| k.bw_util).sum()
    }

    /// Larger of the two concurrent demands.
    pub fn max_util(&self) -> f64 {
        self.total_compute_util().max(self.total_bw_util())
    }

    /// Whether either resource is demanded beyond full capacity.
    pub fn is_overutilized(&self) -> bool {
        self.max_util() > 1.0 + UTIL_EPSILON
    }

    /// Soft notices for each overutilized resource.
    pub fn notices(&self) -> Vec<UtilizationNotice> {
        let mut notices = Vec::new();
        let compute = self.total_compute_util();
        if compute > 1.0 + UTIL_EPSILON {
            notices.push(UtilizationNotice::new(
                self.start(),
                ResourceKind::Compute,
                compute,
            ));
        }
        let bw = self.total_bw_util();
        if bw > 1.0 + UTIL_EPSILON {
            notices.push(UtilizationNotice::new(
                self.start(),
                ResourceKind::Bandwidth,
                bw,
            ));
        }
        notices
    }

    /// Moves every fragment to start at `start`.
    ///
    /// Returns the new end time (max over fragments).
    pub fn update_start_times(&mut self, start: f64) -> f64 {
        for kernel in &mut self.kernels {
            kernel.set_start(start);
        }
        self.kernels
            .iter()
            .map(Kernel::end)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Throttles the interval down to full capacity.
    ///
    /// With `m = max(total compute, total bandwidth)`, nothing changes when
    /// `m ≤ 1.0`. Otherwise every fragment is dilated by `m`: durations
    /// stretch by `m`, utilizations shrink by `1/m`, and the added time is
    /// accumulated in `throttled_duration`. Returns the new end time.
    pub fn scale_durations(&mut self) -> f64 {
        let max_util = self.max_util();
        if max_util <= 1.0 {
            return self.end();
        }

        let scale = 1.0 / max_util;
        for kernel in &mut self.kernels {
            let original = kernel.duration;
            kernel.duration *= max_util;
            kernel.throttled_duration += kernel.duration - original;
            kernel.compute_util *= scale;
            kernel.bw_util *= scale;
        }

        self.end()
    }
}

impl<'a> IntoIterator for &'a Interval {
    type Item = &'a Kernel;
    type IntoIter = std::slice::Iter<'a, Kernel>;

    fn into_iter(self) -> Self::IntoIter {
        self.kernels.iter()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Interval(start={:.2}, end={:.2}, kernels={})",
            self.start(),
            self.end(),
            self.len()
        )?;
        for (k, kernel) in self.kernels.iter().enumerate() {
            writeln!(f, "  Kernel ({k}) - {kernel}")?;
        }
        Ok(())
    }
}
