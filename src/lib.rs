//! Campaign schedules for compute kernels.
//!
//! Models how a sequence of kernels (units of work with a duration and a
//! simultaneous demand on compute and bandwidth) occupies time when run
//! sequentially, tiled, pipelined or throttled to capacity. Used to reason
//! about hardware utilization before committing to an implementation.
//!
//! # Modules
//!
//! - **`models`**: Domain types — `Kernel`, `KernelSpec`, `Interval`,
//!   `UtilizationNotice`
//! - **`partition`**: `Intervals`, the timeline partitioning and throttling engine
//! - **`cascade`**: `Cascade` schedules with tiling, pipelining and KPIs
//! - **`render`**: Display records and color assignment for a chart renderer
//! - **`validation`**: Input integrity checks (non-finite values, negative durations)
//!
//! # Pipeline
//!
//! ```text
//! Kernels → Cascade → Intervals → split / pipeline / throttle → Cascade → render records
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Lam (1988), "Software Pipelining: An Effective Scheduling Technique
//!   for VLIW Machines"

pub mod cascade;
pub mod error;
pub mod models;
pub mod partition;
pub mod render;
pub mod validation;

pub use cascade::{Cascade, CampaignKpi, PipelineOptions};
pub use error::{CampaignError, CampaignResult};
pub use models::{Interval, Kernel, KernelSpec, OriginId};
pub use partition::Intervals;
pub use render::{render_records, KernelColor, RenderPlan, RenderRecord};
