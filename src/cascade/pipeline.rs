//! Software pipelining.
//!
//! Deals a sequential cascade round-robin into `stages` tracks and runs the
//! tracks in lock-step, each offset by one pipeline slot from the previous
//! one. With two stages and a tiled `A B A B ...` cascade, tile `n + 1` of
//! `A` overlaps tile `n` of `B`.
//!
//! # Algorithm
//!
//! 1. Track `s` takes every `stages`-th kernel starting at `s`, padded with
//!    `s` leading and `stages - s - 1` trailing zero-duration spacers.
//! 2. Walk all tracks one step at a time. A step lasts as long as its
//!    longest kernel; every real kernel in the step starts when the step
//!    starts.
//! 3. With `spread`, shorter kernels are dilated to fill the step, so all
//!    lanes advance together at a lower rate for the same work.
//! 4. Padding spacers are dropped; the result keeps the explicit starts.
//!    Zero-duration kernels of the input are real kernels and are kept.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Cascade;
use crate::error::{CampaignError, CampaignResult};
use crate::models::Kernel;

/// Pipelining parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Number of pipeline stages (tracks).
    pub stages: usize,
    /// Dilate shorter kernels to the length of their step.
    pub spread: bool,
}

impl PipelineOptions {
    /// Creates options for `stages` stages without spreading.
    pub fn new(stages: usize) -> Self {
        Self {
            stages,
            spread: false,
        }
    }

    /// Sets whether shorter kernels are dilated to fill their step.
    pub fn with_spread(mut self, spread: bool) -> Self {
        self.spread = spread;
        self
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Cascade {
    /// Pipelines a sequential cascade.
    ///
    /// # Errors
    /// - [`CampaignError::InvalidArgument`] if `options.stages` is 0.
    /// - [`CampaignError::NotSequential`] if the cascade is not a simple series.
    pub fn pipeline(&self, options: PipelineOptions) -> CampaignResult<Cascade> {
        let PipelineOptions { stages, spread } = options;
        if stages == 0 {
            return Err(CampaignError::InvalidArgument(
                "pipeline needs at least one stage".to_string(),
            ));
        }
        let kernels = self.sequential_kernels("pipeline")?;

        let mut tracks = build_tracks(&kernels, stages);
        let steps = tracks.iter().map(Vec::len).max().unwrap_or(0);

        let mut previous_end = 0.0;
        for step in 0..steps {
            let max_duration = tracks
                .iter()
                .filter_map(|track| track.get(step))
                .map(|slot| slot.kernel.duration)
                .fold(0.0, f64::max);

            for slot in tracks.iter_mut().filter_map(|track| track.get_mut(step)) {
                if slot.padding {
                    continue;
                }
                let kernel = &mut slot.kernel;
                kernel.set_start(previous_end);
                if spread && kernel.duration > 0.0 && kernel.duration < max_duration {
                    kernel.dilate(max_duration / kernel.duration)?;
                }
            }

            debug!(step, start = previous_end, max_duration, "Pipeline step");
            previous_end += max_duration;
        }

        let pipelined: Vec<Kernel> = tracks
            .into_iter()
            .flatten()
            .filter(|slot| !slot.padding)
            .map(|slot| slot.kernel)
            .collect();

        info!(
            stages,
            spread,
            kernels = pipelined.len(),
            end = previous_end,
            "Pipelined cascade"
        );
        Cascade::from_kernels(pipelined)
    }

    /// Shorthand for [`Cascade::pipeline`] with explicit arguments.
    pub fn pipeline_with(&self, stages: usize, spread: bool) -> CampaignResult<Cascade> {
        self.pipeline(PipelineOptions::new(stages).with_spread(spread))
    }
}

/// One position in a pipeline track.
#[derive(Debug, Clone)]
struct Slot {
    kernel: Kernel,
    /// Inserted by [`build_tracks`]; never part of the output.
    padding: bool,
}

impl Slot {
    fn real(kernel: Kernel) -> Self {
        Self {
            kernel,
            padding: false,
        }
    }

    fn pad(name: Option<String>) -> Self {
        Self {
            kernel: Kernel::spacer(name),
            padding: true,
        }
    }
}

/// Deals kernels round-robin into padded tracks.
///
/// Spacers carry the name of their track's first kernel so a consumer can
/// group them with the track.
fn build_tracks(kernels: &[Kernel], stages: usize) -> Vec<Vec<Slot>> {
    (0..stages)
        .map(|stage| {
            let lane: Vec<Slot> = kernels
                .iter()
                .skip(stage)
                .step_by(stages)
                .cloned()
                .map(Slot::real)
                .collect();
            let name = lane.first().and_then(|slot| slot.kernel.name.clone());

            let mut track: Vec<Slot> = (0..stage).map(|_| Slot::pad(name.clone())).collect();
            track.extend(lane);
            track.extend((0..stages - stage - 1).map(|_| Slot::pad(name.clone())));
            track
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UTIL_EPSILON;
    use std::collections::HashMap;

    fn tiled_pair(parts: usize) -> Cascade {
        Cascade::new(vec![
            Kernel::new("EinsumA", 5.0, 0.8, 0.2),
            Kernel::new("EinsumB", 10.0, 0.2, 0.6),
        ])
        .unwrap()
        .split(parts)
        .unwrap()
    }

    fn by_name(cascade: &Cascade, name: &str) -> Vec<Kernel> {
        let mut kernels: Vec<Kernel> = cascade
            .kernels()
            .into_iter()
            .filter(|k| k.name.as_deref() == Some(name))
            .collect();
        kernels.sort_by(|a, b| a.start.total_cmp(&b.start));
        kernels
    }

    #[test]
    fn test_default_options() {
        let options = PipelineOptions::default();
        assert_eq!(options.stages, 2);
        assert!(!options.spread);
        assert!(PipelineOptions::new(3).with_spread(true).spread);
    }

    #[test]
    fn test_options_from_json() {
        let options: PipelineOptions =
            serde_json::from_str(r#"{"stages": 3, "spread": true}"#).unwrap();
        assert_eq!(options, PipelineOptions::new(3).with_spread(true));
    }

    #[test]
    fn test_build_tracks_padding() {
        let kernels: Vec<Kernel> = ["A", "B", "A", "B"]
            .iter()
            .map(|name| Kernel::new(*name, 1.0, 0.5, 0.5))
            .collect();
        let tracks = build_tracks(&kernels, 2);

        assert_eq!(tracks.len(), 2);
        let shape = |track: &Vec<Slot>| -> Vec<(String, bool)> {
            track
                .iter()
                .map(|slot| (slot.kernel.display_name().to_string(), slot.padding))
                .collect()
        };
        assert_eq!(
            shape(&tracks[0]),
            vec![("A".into(), false), ("A".into(), false), ("A".into(), true)]
        );
        assert_eq!(
            shape(&tracks[1]),
            vec![("B".into(), true), ("B".into(), false), ("B".into(), false)]
        );
    }

    #[test]
    fn test_two_stage_pipeline_offsets_by_one_slot() {
        let tiled = tiled_pair(2);
        let pipelined = tiled.pipeline(PipelineOptions::default()).unwrap();

        // Fragments: the first B tile [2.5, 7.5) is cut at 5.0 where the
        // second A tile ends
        let a = by_name(&pipelined, "EinsumA");
        let b = by_name(&pipelined, "EinsumB");
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);

        // Track 1 starts exactly when track 0's first kernel ends
        assert!((b[0].start - a[0].end()).abs() < 1e-10);
        // Second A tile runs alongside first B tile
        assert!((a[1].start - b[0].start).abs() < 1e-10);
        // Steps: 2.5, max(2.5, 5), 5
        let b_starts: Vec<f64> = b.iter().map(|k| k.start).collect();
        for (start, expected) in b_starts.iter().zip([2.5, 5.0, 7.5]) {
            assert!((start - expected).abs() < 1e-10);
        }
        assert!((b[2].end() - 12.5).abs() < 1e-10);
        assert!((pipelined.end() - 12.5).abs() < 1e-10);
        assert!(!pipelined.is_sequential());

        // Both B tiles are whole again once fragments are merged
        let b_total: f64 = b.iter().map(|k| k.duration).sum();
        assert!((b_total - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_pipeline_without_spread_keeps_durations() {
        let pipelined = tiled_pair(4).pipeline_with(2, false).unwrap();
        for kernel in by_name(&pipelined, "EinsumA") {
            assert!((kernel.duration - 1.25).abs() < 1e-10);
            assert!((kernel.compute_util - 0.8).abs() < 1e-10);
        }
        // 1.25 + 3 × 2.5 + 2.5
        assert!((pipelined.makespan() - 11.25).abs() < 1e-10);
    }

    #[test]
    fn test_pipeline_with_spread_dilates_short_kernels() {
        let pipelined = tiled_pair(4).pipeline_with(2, true).unwrap();
        let a = by_name(&pipelined, "EinsumA");

        // First tile has nothing beside it and keeps its shape
        assert!((a[0].duration - 1.25).abs() < 1e-10);
        // The others are stretched to the 2.5 step and run at half rate
        for kernel in &a[1..] {
            assert!((kernel.duration - 2.5).abs() < 1e-10);
            assert!((kernel.compute_util - 0.4).abs() < 1e-10);
            assert!((kernel.compute_work() - 1.25 * 0.8).abs() < 1e-10);
        }
        assert!((pipelined.makespan() - 11.25).abs() < 1e-10);
    }

    #[test]
    fn test_pipeline_conserves_kernels() {
        // Three kernels over two stages: tracks of unequal length
        let cascade = Cascade::new(vec![
            Kernel::new("A", 1.0, 0.5, 0.1),
            Kernel::new("B", 2.0, 0.3, 0.2),
            Kernel::new("C", 3.0, 0.2, 0.3),
        ])
        .unwrap();
        let pipelined = cascade.pipeline_with(2, false).unwrap();

        let mut totals: HashMap<String, f64> = HashMap::new();
        for kernel in pipelined.kernels() {
            *totals.entry(kernel.name.unwrap()).or_insert(0.0) += kernel.duration;
        }
        assert_eq!(totals.len(), 3);
        assert!((totals["A"] - 1.0).abs() < 1e-10);
        assert!((totals["B"] - 2.0).abs() < 1e-10);
        assert!((totals["C"] - 3.0).abs() < 1e-10);

        // Steps: A | C beside B | nothing beside the trailing spacer
        assert!((by_name(&pipelined, "B")[0].start - 1.0).abs() < 1e-10);
        assert!((by_name(&pipelined, "C")[0].start - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pipeline_keeps_zero_duration_kernels() {
        let cascade = Cascade::new(vec![
            Kernel::new("A", 1.0, 0.5, 0.1),
            Kernel::new("Sync", 0.0, 0.0, 0.0),
            Kernel::new("B", 1.0, 0.3, 0.2),
        ])
        .unwrap();
        assert!(cascade.is_sequential());
        assert_eq!(cascade.len(), 3);

        for spread in [false, true] {
            let pipelined = cascade.pipeline_with(2, spread).unwrap();
            let sync = by_name(&pipelined, "Sync");
            assert_eq!(sync.len(), 1);
            assert_eq!(sync[0].duration, 0.0);
            // Sync shares the second step with B
            assert!((sync[0].start - 1.0).abs() < 1e-10);
            assert!((by_name(&pipelined, "B")[0].start - 1.0).abs() < 1e-10);
            assert_eq!(pipelined.len(), 3);
        }
    }

    #[test]
    fn test_single_stage_is_identity() {
        let tiled = tiled_pair(2);
        let pipelined = tiled.pipeline_with(1, true).unwrap();
        assert!(pipelined.is_sequential());
        assert_eq!(pipelined.kernels(), tiled.kernels());
    }

    #[test]
    fn test_pipeline_rejects_bad_input() {
        assert!(matches!(
            tiled_pair(2).pipeline_with(0, false),
            Err(CampaignError::InvalidArgument(_))
        ));

        let overlapping = tiled_pair(2).pipeline_with(2, false).unwrap();
        assert!(matches!(
            overlapping.pipeline_with(2, false),
            Err(CampaignError::NotSequential(_))
        ));
    }

    #[test]
    fn test_pipeline_does_not_mutate_receiver() {
        let tiled = tiled_pair(4);
        let before = tiled.clone();
        let _ = tiled.pipeline_with(2, true).unwrap();
        assert_eq!(tiled, before);
    }

    #[test]
    fn test_pipelined_then_throttled() {
        // Spread lanes overlap with combined compute above capacity
        let cascade = Cascade::new(vec![
            Kernel::new("A", 2.0, 0.9, 0.3),
            Kernel::new("B", 2.0, 0.9, 0.3),
        ])
        .unwrap()
        .split(3)
        .unwrap();
        let pipelined = cascade.pipeline_with(2, false).unwrap();
        assert!(!pipelined.notices().is_empty());

        let throttled = pipelined.throttle();
        for interval in throttled.intervals() {
            assert!(interval.total_compute_util() <= 1.0 + UTIL_EPSILON);
            assert!(interval.total_bw_util() <= 1.0 + UTIL_EPSILON);
        }
        assert!(throttled.makespan() > pipelined.makespan());
    }
}
