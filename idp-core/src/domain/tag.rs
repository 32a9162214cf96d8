//! Tag domain types
//!
//! Stacks carry all platform metadata as tags. There is no local store, so
//! these keys are the only index for finding workloads and reclaimable stacks.

use serde::{Deserialize, Serialize};

pub const PREFIX: &str = "idp:";
pub const WORKLOAD: &str = "idp:workload";
pub const WORKFLOW: &str = "idp:workflow";
pub const PROJECT_ID: &str = "idp:projectid";
pub const STAGE: &str = "idp:stage";
pub const AUTO_DELETE: &str = "idp:auto-delete";

/// A user supplied key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn is_reserved(&self) -> bool {
        self.key.starts_with(PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_keys_are_reserved() {
        for key in [WORKLOAD, WORKFLOW, PROJECT_ID, STAGE, AUTO_DELETE] {
            assert!(Tag::new(key, "x").is_reserved(), "{key}");
        }
        assert!(!Tag::new("owner", "ops").is_reserved());
        assert!(!Tag::new("team:idp", "ops").is_reserved());
    }
}
