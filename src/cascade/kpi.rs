//! Campaign quality metrics (KPIs).
//!
//! Summarizes how well a cascade keeps the two resources busy.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Last end − first start |
//! | Busy Time | Time during which at least one kernel is active |
//! | Idle Time | Makespan − busy time |
//! | Peak Utilization | Largest concurrent demand over all intervals |
//! | Avg Utilization | Σ(duration × util) / makespan |
//! | Throttled Time | Σ throttle-added duration over all fragments |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::HashMap;

use super::Cascade;

/// Cascade performance indicators.
#[derive(Debug, Clone)]
pub struct CampaignKpi {
    /// Last end minus first start.
    pub makespan: f64,
    /// Time covered by at least one kernel.
    pub busy_time: f64,
    /// Time inside the makespan with nothing running.
    pub idle_time: f64,
    /// Largest concurrent compute demand.
    pub peak_compute_util: f64,
    /// Largest concurrent bandwidth demand.
    pub peak_bw_util: f64,
    /// Mean compute utilization over the makespan.
    pub avg_compute_util: f64,
    /// Mean bandwidth utilization over the makespan.
    pub avg_bw_util: f64,
    /// Sum of throttle-added duration over all fragments.
    pub throttled_time: f64,
    /// Intervals whose demand exceeds capacity.
    pub overutilized_intervals: usize,
    /// Total fragment duration per kernel name (spacers without a name are skipped).
    pub duration_by_name: HashMap<String, f64>,
}

impl CampaignKpi {
    /// Computes KPIs for a cascade.
    pub fn calculate(cascade: &Cascade) -> Self {
        let intervals = cascade.intervals();
        let makespan = cascade.makespan();
        let busy_time = intervals.total_duration();

        let mut peak_compute_util: f64 = 0.0;
        let mut peak_bw_util: f64 = 0.0;
        let mut overutilized_intervals = 0;
        for interval in intervals {
            peak_compute_util = peak_compute_util.max(interval.total_compute_util());
            peak_bw_util = peak_bw_util.max(interval.total_bw_util());
            if interval.is_overutilized() {
                overutilized_intervals += 1;
            }
        }

        let mut compute_work = 0.0;
        let mut bw_work = 0.0;
        let mut throttled_time = 0.0;
        let mut duration_by_name: HashMap<String, f64> = HashMap::new();
        for kernel in cascade.kernels() {
            compute_work += kernel.compute_work();
            bw_work += kernel.bw_work();
            throttled_time += kernel.throttled_duration;
            if let Some(name) = kernel.name {
                *duration_by_name.entry(name).or_insert(0.0) += kernel.duration;
            }
        }

        let (avg_compute_util, avg_bw_util) = if makespan > 0.0 {
            (compute_work / makespan, bw_work / makespan)
        } else {
            (0.0, 0.0)
        };

        Self {
            makespan,
            busy_time,
            idle_time: (makespan - busy_time).max(0.0),
            peak_compute_util,
            peak_bw_util,
            avg_compute_util,
            avg_bw_util,
            throttled_time,
            overutilized_intervals,
            duration_by_name,
        }
    }

    /// Whether the cascade meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: f64, min_avg_compute_util: f64) -> bool {
        self.makespan <= max_makespan && self.avg_compute_util >= min_avg_compute_util
    }
}
