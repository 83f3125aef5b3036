pub mod sync_scheduler;
pub mod tracing;
