//! Error types for campaign construction and transforms.
//!
//! Precondition and invariant failures abort the transform that raised
//! them; no partially built [`Cascade`](crate::cascade::Cascade) is ever
//! returned. Soft overutilization is not an error: it is reported as a
//! [`UtilizationNotice`](crate::models::UtilizationNotice).

use thiserror::Error;

/// Main error type for campaign operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CampaignError {
    /// A transform that needs a back-to-back schedule starting at 0 was
    /// applied to something else.
    #[error("Cascade is not sequential: {0}")]
    NotSequential(String),

    /// An argument is outside its valid domain (zero parts, zero stages,
    /// non-positive dilation factor, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Input kernels failed validation.
    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    /// An interval whose fragments disagree on start or end.
    ///
    /// Only the partitioning algorithm builds intervals, so this signals a
    /// bug there rather than bad input.
    #[error("Broken interval: {0}")]
    BrokenInterval(String),
}

/// Result type for campaign operations.
pub type CampaignResult<T> = Result<T, CampaignError>;
