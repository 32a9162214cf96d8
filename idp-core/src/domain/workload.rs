//! Workload kinds

use serde::{Deserialize, Serialize};
use std::fmt;

use super::tag;

/// The platform provisions two kinds of stack that share one lifecycle and
/// differ only in the tag key that marks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Workload,
    Workflow,
}

impl WorkloadKind {
    pub fn tag_key(&self) -> &'static str {
        match self {
            WorkloadKind::Workload => tag::WORKLOAD,
            WorkloadKind::Workflow => tag::WORKFLOW,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Workload => "workload",
            WorkloadKind::Workflow => "workflow",
        }
    }

    /// Collection name used in routes (`workloads`, `workflows`)
    pub fn plural(&self) -> &'static str {
        match self {
            WorkloadKind::Workload => "workloads",
            WorkloadKind::Workflow => "workflows",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
