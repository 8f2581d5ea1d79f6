//! Timeline partitioning.
//!
//! Converts an unordered, overlapping kernel set into an ordered sequence
//! of [`Interval`]s, each a maximal segment over which the same set of
//! kernels is active. Kernels spanning a segment boundary are split; the
//! fragments keep the kernel's origin.
//!
//! # Algorithm
//!
//! Sweep over start-sorted events:
//!
//! 1. Sort by `(start ascending, duration descending)`. Among kernels that
//!    start together the longest is handled first, which fixes split order.
//! 2. Pop the next kernel and gather every pooled kernel with the same
//!    start into the active set. The segment boundary is the earliest of
//!    any active kernel's end and the next pooled kernel's start.
//! 3. Active kernels ending at the boundary are kept whole. The others are
//!    split there; the head joins the interval and the tail goes back to
//!    the front of the pool, which keeps the pool start-sorted.
//! 4. Emit the interval and repeat until the pool is empty.
//!
//! # Complexity
//! O(n log n) for the sort plus O(k) per interval, where k is the size of
//! its active set.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 16.1
//! (Activity Selection), sweep-line formulation.

mod throttle;

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CampaignError, CampaignResult};
use crate::models::{approx_eq, Interval, Kernel, UtilizationNotice};
use crate::validation::{overutilized_kernels, validate_kernels};

/// An ordered partition of a kernel set into flat intervals.
///
/// Flattening yields every input kernel, possibly split into several
/// fragments whose durations sum to the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Intervals {
    intervals: Vec<Interval>,
}

impl Intervals {
    /// Partitions a kernel set.
    ///
    /// # Errors
    /// - [`CampaignError::InvalidKernel`] if any kernel fails validation.
    /// - [`CampaignError::BrokenInterval`] if a produced interval is not
    ///   flat (a bug in the partitioning itself).
    pub fn new(kernels: Vec<Kernel>) -> CampaignResult<Self> {
        if let Err(errors) = validate_kernels(&kernels) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CampaignError::InvalidKernel(message));
        }

        for notice in overutilized_kernels(&kernels) {
            warn!(%notice, "Kernel demand exceeds capacity");
        }

        debug!(kernels = kernels.len(), "Initialize intervals");
        let intervals = group_into_intervals(kernels)?;
        debug!(intervals = intervals.len(), "Partitioned kernels");

        Ok(Self { intervals })
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether there are no intervals.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Interval at `index`.
    pub fn get(&self, index: usize) -> Option<&Interval> {
        self.intervals.get(index)
    }

    /// Iterates over the intervals in time order.
    pub fn iter(&self) -> std::slice::Iter<'_, Interval> {
        self.intervals.iter()
    }

    /// All fragments, interval by interval.
    pub fn flatten(&self) -> Vec<Kernel> {
        self.intervals
            .iter()
            .flat_map(|interval| interval.iter().cloned())
            .collect()
    }

    /// Start of the first interval (0 when empty).
    pub fn start(&self) -> f64 {
        self.intervals.first().map_or(0.0, Interval::start)
    }

    /// Latest interval end (0 when empty).
    pub fn end(&self) -> f64 {
        self.intervals
            .iter()
            .map(Interval::end)
            .fold(0.0, f64::max)
    }

    /// Sum of interval lengths (time during which something is active).
    pub fn total_duration(&self) -> f64 {
        self.intervals.iter().map(Interval::duration).sum()
    }

    /// Soft notices for every overutilized interval.
    pub fn notices(&self) -> Vec<UtilizationNotice> {
        self.intervals.iter().flat_map(Interval::notices).collect()
    }
}

impl<'a> IntoIterator for &'a Intervals {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl fmt::Display for Intervals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Intervals({} intervals)", self.len())?;
        for (i, interval) in self.intervals.iter().enumerate() {
            write!(f, "Interval: {i} - {interval}")?;
        }
        Ok(())
    }
}

/// Longest-first among equal starts.
fn by_start_then_longest(a: &Kernel, b: &Kernel) -> Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| b.duration.total_cmp(&a.duration))
}

fn group_into_intervals(mut kernels: Vec<Kernel>) -> CampaignResult<Vec<Interval>> {
    kernels.sort_by(by_start_then_longest);
    let mut pool: VecDeque<Kernel> = kernels.into();
    let mut intervals = Vec::new();

    while let Some(anchor) = pool.pop_front() {
        let current_start = anchor.start;
        let mut active = vec![anchor];
        while pool
            .front()
            .is_some_and(|next| approx_eq(next.start, current_start))
        {
            if let Some(next) = pool.pop_front() {
                active.push(next);
            }
        }
        // Pushed-back tails sit ahead of pooled kernels; restore longest-first
        active.sort_by(|a, b| b.duration.total_cmp(&a.duration));

        let mut boundary = active
            .iter()
            .map(Kernel::end)
            .fold(f64::INFINITY, f64::min);
        if let Some(next) = pool.front() {
            boundary = boundary.min(next.start);
        }
        debug!(start = current_start, boundary, active = active.len(), "Interval boundary");

        let mut members = Vec::with_capacity(active.len());
        let mut deferred = Vec::new();
        for kernel in active {
            if approx_eq(kernel.end(), boundary) {
                members.push(kernel);
            } else if approx_eq(kernel.start, boundary) {
                // Zero-length segment from a zero-duration neighbour
                deferred.push(kernel);
            } else {
                let (head, tail) = kernel.split(boundary);
                members.push(head);
                if let Some(tail) = tail {
                    deferred.push(tail);
                }
            }
        }

        for kernel in deferred.into_iter().rev() {
            pool.push_front(kernel);
        }

        intervals.push(Interval::new(members)?);
    }

    Ok(intervals)
}
