//! Services module
//!
//! The alarm scheduler and the read-only query facade built on the store.

pub mod queries;
pub mod scheduler;

pub use queries::QueryService;
pub use scheduler::{AlarmFired, AlarmScheduler, SchedulerHandle, SuppressionMap};
