pub mod erp_api_client;
pub mod executor;
pub mod field_resolver;
pub mod identity;
pub mod invoice_assembler;
pub mod mappers;
pub mod mock_api_client;
pub mod processors;
pub mod progress_tracker;
pub mod record_extractor;
pub mod rest_api_client;
pub mod source_api;
pub mod source_models;
pub mod sync_service;

#[cfg(test)]
pub mod test_support;

pub use executor::SyncExecutor;
pub use progress_tracker::ProgressTracker;
pub use sync_service::SyncService;
