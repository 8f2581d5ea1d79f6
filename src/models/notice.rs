//! Soft overutilization notices.
//!
//! Demand above full capacity is expected input: throttling exists to
//! correct it. These notices make it observable without interrupting
//! control flow.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two shared resources a kernel draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Compute capacity.
    Compute,
    /// Memory/interconnect bandwidth.
    Bandwidth,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Compute => write!(f, "compute"),
            ResourceKind::Bandwidth => write!(f, "bandwidth"),
        }
    }
}

/// Demand on a resource exceeded full capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationNotice {
    /// Time at which the demand applies.
    pub time: f64,
    /// Overutilized resource.
    pub resource: ResourceKind,
    /// Demand observed (> 1.0).
    pub utilization: f64,
    /// Kernel responsible, when a single kernel is at fault.
    pub name: Option<String>,
}

impl UtilizationNotice {
    /// Creates a notice for concurrent demand at `time`.
    pub fn new(time: f64, resource: ResourceKind, utilization: f64) -> Self {
        Self {
            time,
            resource,
            utilization,
            name: None,
        }
    }

    /// Attributes the notice to a kernel.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

impl fmt::Display for UtilizationNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}: {} overflow ({:.2})",
            self.time, self.resource, self.utilization
        )?;
        if let Some(name) = &self.name {
            write!(f, " in {name}")?;
        }
        Ok(())
    }
}
