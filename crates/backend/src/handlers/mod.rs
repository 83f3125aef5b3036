pub mod a001_tenant;
pub mod app_state;
pub mod p901_inventory_directory;
pub mod u501_sync;

pub use app_state::AppState;
