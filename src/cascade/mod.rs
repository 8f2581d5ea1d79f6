//! Cascades: kernel schedules and their transforms.
//!
//! A [`Cascade`] is an ordered schedule of kernels backed by an
//! [`Intervals`] partition. Its kernel list is always the flattened view of
//! that partition, recomputed on demand.
//!
//! # Transforms
//!
//! | Transform | Effect |
//! |-----------|--------|
//! | [`Cascade::split`] | Tiles every kernel into `n` repeated, `1/n`-long sub-kernels |
//! | [`Cascade::pipeline`] | Staggers kernels into overlapping pipeline lanes |
//! | [`Cascade::throttle`] | Stretches overutilized intervals down to capacity |
//!
//! Transforms take `&self` and return a new cascade; the receiver is never
//! modified.

mod kpi;
mod pipeline;

pub use kpi::CampaignKpi;
pub use pipeline::PipelineOptions;

use std::fmt;

use tracing::info;

use crate::error::{CampaignError, CampaignResult};
use crate::models::{approx_eq, Kernel, UtilizationNotice};
use crate::partition::Intervals;

/// A schedule of kernels.
///
/// # Example
///
/// ```
/// use u_campaign::cascade::Cascade;
/// use u_campaign::models::Kernel;
///
/// let cascade = Cascade::new(vec![
///     Kernel::new("EinsumA", 5.0, 0.8, 0.2),
///     Kernel::new("EinsumB", 10.0, 0.2, 0.6),
/// ])
/// .unwrap();
///
/// let tiled = cascade.split(4).unwrap();
/// assert_eq!(tiled.len(), 8);
///
/// let pipelined = tiled.pipeline_with(2, true).unwrap();
/// assert!(pipelined.makespan() < tiled.makespan());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cascade {
    intervals: Intervals,
}

/// Assigns back-to-back starts beginning at `offset`.
///
/// Each kernel starts where the previous one ends. Returns the end of the
/// last kernel (or `offset` for an empty slice).
pub fn assign_starts(kernels: &mut [Kernel], offset: f64) -> f64 {
    let mut last_end = offset;
    for kernel in kernels.iter_mut() {
        kernel.set_start(last_end);
        last_end = kernel.end();
    }
    last_end
}

impl Cascade {
    /// Creates a sequential cascade starting at 0.
    pub fn new(kernels: Vec<Kernel>) -> CampaignResult<Self> {
        Self::with_offset(kernels, 0.0)
    }

    /// Creates a sequential cascade starting at `offset`.
    pub fn with_offset(mut kernels: Vec<Kernel>, offset: f64) -> CampaignResult<Self> {
        assign_starts(&mut kernels, offset);
        Self::from_kernels(kernels)
    }

    /// Creates a cascade from kernels with explicit start times.
    pub fn from_kernels(kernels: Vec<Kernel>) -> CampaignResult<Self> {
        Ok(Self {
            intervals: Intervals::new(kernels)?,
        })
    }

    /// Wraps an existing partition.
    pub fn from_intervals(intervals: Intervals) -> Self {
        Self { intervals }
    }

    /// The underlying partition.
    pub fn intervals(&self) -> &Intervals {
        &self.intervals
    }

    /// Flattened kernel fragments, in interval order.
    pub fn kernels(&self) -> Vec<Kernel> {
        self.intervals.flatten()
    }

    /// Number of kernel fragments.
    pub fn len(&self) -> usize {
        self.intervals.iter().map(|interval| interval.len()).sum()
    }

    /// Whether the cascade has no kernels.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Start of the earliest kernel.
    pub fn start(&self) -> f64 {
        self.intervals.start()
    }

    /// End of the latest kernel.
    pub fn end(&self) -> f64 {
        self.intervals.end()
    }

    /// Span from the first start to the last end.
    pub fn makespan(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.end() - self.start()
        }
    }

    /// Soft notices for every overutilized interval.
    pub fn notices(&self) -> Vec<UtilizationNotice> {
        self.intervals.notices()
    }

    /// Whether kernels run back to back from time 0 without gaps or overlap.
    pub fn is_sequential(&self) -> bool {
        self.sequence_gap().is_none()
    }

    /// First place where the cascade stops being a simple series.
    fn sequence_gap(&self) -> Option<String> {
        let kernels = self.kernels();
        let first = kernels.first()?;
        if !approx_eq(first.start, 0.0) {
            return Some(format!("first kernel starts at {:.2}, not 0", first.start));
        }
        kernels.windows(2).find_map(|pair| {
            (!approx_eq(pair[0].end(), pair[1].start)).then(|| {
                format!(
                    "{} ends at {:.2} but {} starts at {:.2}",
                    pair[0].display_name(),
                    pair[0].end(),
                    pair[1].display_name(),
                    pair[1].start
                )
            })
        })
    }

    /// Kernels of a sequential cascade, or why it is not one.
    fn sequential_kernels(&self, operation: &str) -> CampaignResult<Vec<Kernel>> {
        match self.sequence_gap() {
            Some(reason) => Err(CampaignError::NotSequential(format!(
                "{operation} needs a sequential cascade: {reason}"
            ))),
            None => Ok(self.kernels()),
        }
    }

    /// Tiles the cascade into `parts` repetitions of `1/parts`-long kernels.
    ///
    /// Every kernel keeps its utilizations and origin; the scaled sequence
    /// is repeated `parts` times back to back, so total time per kernel is
    /// unchanged.
    ///
    /// # Errors
    /// - [`CampaignError::InvalidArgument`] if `parts` is 0.
    /// - [`CampaignError::NotSequential`] if the cascade is not a simple series.
    pub fn split(&self, parts: usize) -> CampaignResult<Cascade> {
        if parts == 0 {
            return Err(CampaignError::InvalidArgument(
                "split needs at least one part".to_string(),
            ));
        }
        let mut tiles = self.sequential_kernels("split")?;

        let fraction = 1.0 / parts as f64;
        for tile in &mut tiles {
            tile.scale_duration(fraction)?;
        }

        let repeated: Vec<Kernel> = (0..parts)
            .flat_map(|_| tiles.iter().cloned())
            .collect();

        info!(parts, kernels = repeated.len(), "Split cascade");
        Cascade::new(repeated)
    }

    /// Returns a throttled copy of the cascade, re-stacked from time 0.
    ///
    /// See [`Intervals::throttle`].
    pub fn throttle(&self) -> Cascade {
        Cascade::from_intervals(self.intervals.throttle())
    }

    /// Returns a throttled copy stacked from `anchor`.
    ///
    /// See [`Intervals::throttle_from`].
    pub fn throttle_from(&self, anchor: f64) -> Cascade {
        Cascade::from_intervals(self.intervals.throttle_from(anchor))
    }
}

impl fmt::Display for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cascade with kernels:")?;
        for kernel in self.kernels() {
            writeln!(f, "{kernel}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UTIL_EPSILON;
    use std::collections::HashMap;

    fn einsums() -> Vec<Kernel> {
        vec![
            Kernel::new("EinsumA", 3.0, 0.7, 0.25),
            Kernel::new("EinsumB", 10.0, 0.2, 0.9),
            Kernel::new("EinsumC", 2.0, 0.6, 0.4),
        ]
    }

    fn tile_pair() -> Cascade {
        Cascade::new(vec![
            Kernel::new("EinsumA", 5.0, 0.8, 0.2),
            Kernel::new("EinsumB", 10.0, 0.2, 0.6),
        ])
        .unwrap()
    }

    #[test]
    fn test_assign_starts() {
        let mut kernels = einsums();
        let end = assign_starts(&mut kernels, 1.0);
        let starts: Vec<f64> = kernels.iter().map(|k| k.start).collect();
        assert_eq!(starts, vec![1.0, 4.0, 14.0]);
        assert!((end - 16.0).abs() < 1e-10);

        assert_eq!(assign_starts(&mut [], 3.0), 3.0);
    }

    #[test]
    fn test_sequential_cascade() {
        let cascade = Cascade::new(einsums()).unwrap();

        assert_eq!(cascade.intervals().len(), 3);
        assert!(cascade.intervals().iter().all(|iv| iv.len() == 1));
        assert!(cascade.is_sequential());
        assert_eq!(cascade.len(), 3);
        assert!((cascade.makespan() - 15.0).abs() < 1e-10);
        assert!(cascade.notices().is_empty());

        let throttled = cascade.throttle();
        assert_eq!(throttled, cascade);
        assert!(throttled.kernels()[0].start == 0.0);
    }

    #[test]
    fn test_with_offset_is_not_sequential() {
        let cascade = Cascade::with_offset(einsums(), 2.0).unwrap();
        assert!((cascade.start() - 2.0).abs() < 1e-10);
        assert!(!cascade.is_sequential());
        assert!(matches!(
            cascade.split(2),
            Err(CampaignError::NotSequential(msg)) if msg.contains("not 0")
        ));
    }

    #[test]
    fn test_overlapping_cascade_is_not_sequential() {
        let cascade = Cascade::from_kernels(vec![
            Kernel::new("Short", 2.0, 0.4, 0.3),
            Kernel::new("Long", 5.0, 0.5, 0.3),
        ])
        .unwrap();

        assert_eq!(cascade.intervals().len(), 2);
        assert_eq!(cascade.intervals().get(0).unwrap().len(), 2);
        assert_eq!(cascade.intervals().get(1).unwrap().len(), 1);
        assert!(!cascade.is_sequential());
    }

    #[test]
    fn test_empty_cascade() {
        let cascade = Cascade::new(Vec::new()).unwrap();
        assert!(cascade.is_empty());
        assert!(cascade.is_sequential());
        assert_eq!(cascade.makespan(), 0.0);
        assert!(cascade.split(3).unwrap().is_empty());
    }

    #[test]
    fn test_split_into_tiles() {
        let cascade = tile_pair();
        let tiled = cascade.split(4).unwrap();

        assert_eq!(tiled.len(), 8);
        assert!(tiled.is_sequential());

        let durations: Vec<f64> = tiled.kernels().iter().map(|k| k.duration).collect();
        assert_eq!(durations, vec![1.25, 2.5, 1.25, 2.5, 1.25, 2.5, 1.25, 2.5]);

        let mut totals: HashMap<String, f64> = HashMap::new();
        for kernel in tiled.kernels() {
            *totals.entry(kernel.name.unwrap()).or_insert(0.0) += kernel.duration;
        }
        assert!((totals["EinsumA"] - 5.0).abs() < 1e-10);
        assert!((totals["EinsumB"] - 10.0).abs() < 1e-10);
        assert!((tiled.makespan() - cascade.makespan()).abs() < 1e-10);
    }

    #[test]
    fn test_split_preserves_origin_and_receiver() {
        let cascade = tile_pair();
        let before = cascade.clone();
        let originals = cascade.kernels();

        let tiled = cascade.split(3).unwrap();
        assert_eq!(cascade, before);

        for (i, tile) in tiled.kernels().iter().enumerate() {
            assert_eq!(tile.origin, originals[i % 2].origin);
            assert!((tile.compute_util - originals[i % 2].compute_util).abs() < 1e-10);
        }
    }

    #[test]
    fn test_split_rejects_zero_parts() {
        assert!(matches!(
            tile_pair().split(0),
            Err(CampaignError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_throttle_offset_cascade() {
        let cascade = Cascade::with_offset(
            vec![
                Kernel::new("A", 2.0, 0.5, 0.5),
                Kernel::new("B", 2.0, 0.5, 0.5),
            ],
            3.0,
        )
        .unwrap();
        assert!(!cascade.is_sequential());

        let throttled = cascade.throttle();
        assert_eq!(throttled.kernels()[0].start, 0.0);
        assert!((throttled.kernels()[1].start - 2.0).abs() < 1e-10);
        assert!(throttled.is_sequential());

        let anchored = cascade.throttle_from(cascade.start());
        assert_eq!(anchored, cascade);
    }

    #[test]
    fn test_throttle_overlapping_cascade() {
        let cascade = Cascade::from_kernels(vec![
            Kernel::new("A", 4.0, 0.9, 0.5),
            Kernel::new("B", 4.0, 0.6, 0.7),
        ])
        .unwrap();
        assert_eq!(cascade.notices().len(), 2);

        let throttled = cascade.throttle();
        assert!(throttled.notices().is_empty());
        for interval in throttled.intervals() {
            assert!(interval.max_util() <= 1.0 + UTIL_EPSILON);
        }
        // Peak demand 1.5 → 4.0 stretched to 6.0
        assert!((throttled.makespan() - 6.0).abs() < 1e-9);
        assert!((cascade.makespan() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_display() {
        let text = Cascade::new(einsums()).unwrap().to_string();
        assert!(text.starts_with("Cascade with kernels:"));
        assert_eq!(text.lines().count(), 4);
    }
}
