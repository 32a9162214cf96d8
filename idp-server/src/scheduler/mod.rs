//! Background scheduling

pub mod reclaimer;

pub use reclaimer::{DeletionCriteria, ReclaimSummary, ReclaimerError, StackReclaimer};
