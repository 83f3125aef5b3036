pub mod progress;
pub mod report;
pub mod request;
pub mod response;

pub use progress::{SyncProgress, SyncStatus};
pub use report::{SyncIssue, SyncReport};
pub use request::{SyncRequest, SyncStage, SyncStrategy};
pub use response::{CancelResponse, ScheduledRunResponse, SyncStartResponse};
