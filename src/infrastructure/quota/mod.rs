//! Scheduled quota maintenance

mod scheduler;

pub use scheduler::{QuotaResetScheduler, ResetFailure, ResetSummary};
