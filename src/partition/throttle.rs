//! Resource throttling.
//!
//! Re-stacks a partition so that no interval demands more than full
//! capacity on either resource. Each overutilized interval is dilated by
//! its peak demand, and every later interval is shifted to start right
//! where the previous one now ends. Stacking begins at time 0 unless an
//! explicit anchor is given.

use tracing::{info, warn};

use super::Intervals;

impl Intervals {
    /// Returns a throttled copy of the partition, stacked from time 0.
    ///
    /// The receiver is left untouched, so throttled and unthrottled
    /// schedules can be compared. Intervals are re-anchored back to back;
    /// gaps between intervals close and any leading offset is dropped.
    ///
    /// After throttling every interval satisfies
    /// `total_compute_util() ≤ 1.0` and `total_bw_util() ≤ 1.0`
    /// (up to floating-point rounding).
    pub fn throttle(&self) -> Intervals {
        self.throttle_from(0.0)
    }

    /// Like [`Intervals::throttle`], but stacks intervals from `anchor`.
    ///
    /// `throttle_from(self.start())` keeps a schedule's leading offset.
    pub fn throttle_from(&self, anchor: f64) -> Intervals {
        let mut throttled = self.clone();
        let mut prev_end = anchor;
        let mut stretched = 0usize;

        for interval in &mut throttled.intervals {
            let anchored_end = interval.update_start_times(prev_end);

            for notice in interval.notices() {
                warn!(%notice, "Throttling interval");
            }
            if interval.is_overutilized() {
                stretched += 1;
            }

            let scaled_end = interval.scale_durations();
            prev_end = anchored_end.max(scaled_end);
        }

        info!(
            anchor,
            intervals = throttled.len(),
            stretched,
            end = prev_end,
            "Throttled intervals"
        );

        throttled
    }
}
