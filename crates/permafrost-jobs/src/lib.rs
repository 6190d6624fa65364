//! # permafrost-jobs
//!
//! Archive and restore orchestration. Each orchestrator drives one run of
//! its protocol over the collaborator traits from `permafrost-core`:
//! artifacts first, metadata second, the warehouse mutation last.

pub mod archive;
pub mod constraints;
pub mod notify;
pub mod restore;

pub use archive::ArchiveOrchestrator;
pub use constraints::{ConstraintPlan, ConstraintResolver};
pub use notify::{NotifyConfig, Notifier};
pub use restore::RestoreOrchestrator;
