//! Render boundary.
//!
//! Prepares a cascade for an external chart renderer: a display-ordered
//! list of kernel records with colors, legend labels and the stacking
//! levels a campaign diagram draws at. No drawing happens here.
//!
//! # Display Order
//! Records are sorted by `(start, bandwidth descending, compute ascending,
//! name)`. Kernels sharing a start stack on top of each other; the running
//! compute sum is the height of each record's compute line.
//!
//! # Colors
//! [`KernelColor`] hands out palette colors per distinct name in
//! first-seen order, wrapping around when the palette is exhausted. The
//! allocator is owned by the caller, so several diagrams can share or
//! keep separate color assignments.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::cascade::Cascade;
use crate::models::{Kernel, OriginId, ResourceKind, UtilizationNotice, UTIL_EPSILON};

/// Palette used for kernel names, in allocation order.
pub const PALETTE: [&str; 25] = [
    "#0000FF", // Blue
    "#00FF00", // Green
    "#FF0000", // Red
    "#FFFF00", // Yellow
    "#FF00FF", // Magenta
    "#00FFFF", // Cyan
    "#C0C0C0", // Silver
    "#808080", // Gray
    "#800000", // Maroon
    "#808000", // Olive
    "#008000", // Dark Green
    "#800080", // Purple
    "#000080", // Navy
    "#FFA500", // Orange
    "#FFC0CB", // Pink
    "#FFD700", // Gold
    "#F08080", // Light Coral
    "#6495ED", // Cornflower Blue
    "#228B22", // Forest Green
    "#DB7093", // Pale Violet Red
    "#FF6347", // Tomato
    "#87CEEB", // Sky Blue
    "#FFE4C4", // Bisque
    "#98FB98", // Pale Green
    "#9370DB", // Medium Purple
];

/// How much lighter the bandwidth color is than the compute color.
const BW_LIGHTEN: f64 = 0.5;

/// Deterministic name → color allocator.
#[derive(Debug, Clone, Default)]
pub struct KernelColor {
    next_index: usize,
    assigned: HashMap<Option<String>, &'static str>,
}

impl KernelColor {
    /// Creates an allocator starting at the first palette entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Color for `name`, allocating the next palette entry on first sight.
    pub fn color_for(&mut self, name: Option<&str>) -> &'static str {
        let key = name.map(str::to_string);
        if let Some(&color) = self.assigned.get(&key) {
            return color;
        }
        let color = self.next_color();
        self.assigned.insert(key, color);
        color
    }

    /// Number of distinct names seen so far.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    /// Whether no color has been handed out yet.
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    fn next_color(&mut self) -> &'static str {
        let color = PALETTE[self.next_index];
        self.next_index = (self.next_index + 1) % PALETTE.len();
        color
    }

    /// Blends a `#rrggbb` color towards white by `amount` (0..=1).
    ///
    /// Malformed input is returned unchanged.
    pub fn lighten(hex_color: &str, amount: f64) -> String {
        if hex_color.len() != 7 || !hex_color.starts_with('#') {
            return hex_color.to_string();
        }
        let channel = |range: std::ops::Range<usize>| {
            hex_color
                .get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        };
        let (Some(r), Some(g), Some(b)) = (channel(1..3), channel(3..5), channel(5..7)) else {
            return hex_color.to_string();
        };

        let lift = |c: u8| -> u8 {
            let lifted = f64::from(c) + (255.0 - f64::from(c)) * amount.clamp(0.0, 1.0);
            lifted.min(255.0) as u8
        };
        format!("#{:02X}{:02X}{:02X}", lift(r), lift(g), lift(b))
    }
}

/// One kernel as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRecord {
    /// Kernel name.
    pub name: Option<String>,
    /// Legend label: the name on its first appearance, `None` afterwards.
    pub label: Option<String>,
    /// Start time.
    pub start: f64,
    /// End time.
    pub end: f64,
    /// Duration.
    pub duration: f64,
    /// Throttle-added part of `duration`.
    pub throttled_duration: f64,
    /// Compute utilization.
    pub compute_util: f64,
    /// Bandwidth utilization.
    pub bw_util: f64,
    /// Lineage of the fragment.
    pub origin: OriginId,
    /// Color of the compute line.
    pub compute_color: String,
    /// Color of the bandwidth band (lighter shade).
    pub bw_color: String,
    /// Compute demand of this and earlier records sharing its start.
    pub cumulative_compute_util: f64,
    /// Bandwidth demand of this and earlier records sharing its start.
    pub cumulative_bw_util: f64,
}

/// Everything a renderer needs for one cascade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderPlan {
    /// Display-ordered records.
    pub records: Vec<RenderRecord>,
    /// Overflows seen while stacking records.
    pub notices: Vec<UtilizationNotice>,
}

impl RenderPlan {
    /// Largest stacking level (at least 1.0, the capacity line).
    pub fn max_compute_util(&self) -> f64 {
        self.records
            .iter()
            .map(|r| r.cumulative_compute_util)
            .fold(1.0, f64::max)
    }
}

/// Display ordering of kernels.
fn display_order(a: &Kernel, b: &Kernel) -> std::cmp::Ordering {
    a.start
        .total_cmp(&b.start)
        .then_with(|| b.bw_util.total_cmp(&a.bw_util))
        .then_with(|| a.compute_util.total_cmp(&b.compute_util))
        .then_with(|| a.name.cmp(&b.name))
}

/// Builds the render records for a cascade.
///
/// Colors are allocated in cascade order so that the legend follows the
/// schedule rather than the display sort.
pub fn render_records(cascade: &Cascade, colors: &mut KernelColor) -> RenderPlan {
    let mut kernels = cascade.kernels();
    for kernel in &kernels {
        colors.color_for(kernel.name.as_deref());
    }
    kernels.sort_by(display_order);

    let mut plan = RenderPlan::default();
    let mut labelled: Vec<&str> = Vec::new();
    let mut current_start: Option<f64> = None;
    let mut cumulative_compute = 0.0;
    let mut cumulative_bw = 0.0;

    for kernel in &kernels {
        let label = match kernel.name.as_deref() {
            Some(name) if !labelled.contains(&name) => {
                labelled.push(name);
                Some(name.to_string())
            }
            _ => None,
        };

        if current_start != Some(kernel.start) {
            current_start = Some(kernel.start);
            cumulative_compute = 0.0;
            cumulative_bw = 0.0;
        }
        cumulative_compute += kernel.compute_util;
        cumulative_bw += kernel.bw_util;

        for (resource, util) in [
            (ResourceKind::Compute, cumulative_compute),
            (ResourceKind::Bandwidth, cumulative_bw),
        ] {
            if util > 1.0 + UTIL_EPSILON {
                let notice = UtilizationNotice::new(kernel.start, resource, util);
                warn!(%notice, "Stacked demand exceeds capacity");
                plan.notices.push(notice);
            }
        }

        let compute_color = colors.color_for(kernel.name.as_deref());
        plan.records.push(RenderRecord {
            name: kernel.name.clone(),
            label,
            start: kernel.start,
            end: kernel.end(),
            duration: kernel.duration,
            throttled_duration: kernel.throttled_duration,
            compute_util: kernel.compute_util,
            bw_util: kernel.bw_util,
            origin: kernel.origin,
            compute_color: compute_color.to_string(),
            bw_color: KernelColor::lighten(compute_color, BW_LIGHTEN),
            cumulative_compute_util: cumulative_compute,
            cumulative_bw_util: cumulative_bw,
        });
    }

    plan
}
