//! Input validation for kernel sets.
//!
//! Checks kernels before they are partitioned. Detects:
//! - Non-finite fields (NaN or infinite start, duration, utilization)
//! - Negative durations
//! - Negative utilizations
//!
//! Demand above full capacity is not an error. [`overutilized_kernels`]
//! reports it as soft notices so throttling can proceed.

use crate::models::{Kernel, ResourceKind, UtilizationNotice, UTIL_EPSILON};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Position of the offending kernel in the input.
    pub index: usize,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A time or utilization field is NaN or infinite.
    NonFinite,
    /// Duration below zero (end before start).
    NegativeDuration,
    /// Compute or bandwidth utilization below zero.
    NegativeUtilization,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            index,
            message: message.into(),
        }
    }
}

/// Validates a kernel set.
///
/// Checks:
/// 1. `start`, `duration`, `compute_util`, `bw_util` are finite
/// 2. `duration ≥ 0`
/// 3. `compute_util ≥ 0` and `bw_util ≥ 0`
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_kernels(kernels: &[Kernel]) -> ValidationResult {
    let mut errors = Vec::new();

    for (index, kernel) in kernels.iter().enumerate() {
        let name = kernel.display_name();

        let fields = [
            ("start", kernel.start),
            ("duration", kernel.duration),
            ("compute_util", kernel.compute_util),
            ("bw_util", kernel.bw_util),
        ];
        let non_finite: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| !value.is_finite())
            .map(|(field, _)| *field)
            .collect();
        if !non_finite.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NonFinite,
                index,
                format!("Kernel '{name}' has non-finite {}", non_finite.join(", ")),
            ));
            continue;
        }

        if kernel.duration < 0.0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeDuration,
                index,
                format!("Kernel '{name}' has negative duration {}", kernel.duration),
            ));
        }

        if kernel.compute_util < 0.0 || kernel.bw_util < 0.0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::NegativeUtilization,
                index,
                format!(
                    "Kernel '{name}' has negative utilization (compute {}, bandwidth {})",
                    kernel.compute_util, kernel.bw_util
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Kernels that alone demand more than full capacity.
///
/// One notice per offending resource, stamped with the kernel's start.
pub fn overutilized_kernels(kernels: &[Kernel]) -> Vec<UtilizationNotice> {
    let mut notices = Vec::new();
    for kernel in kernels {
        for (resource, util) in [
            (ResourceKind::Compute, kernel.compute_util),
            (ResourceKind::Bandwidth, kernel.bw_util),
        ] {
            if util > 1.0 + UTIL_EPSILON {
                notices.push(
                    UtilizationNotice::new(kernel.start, resource, util)
                        .with_name(kernel.name.clone()),
                );
            }
        }
    }
    notices
}
