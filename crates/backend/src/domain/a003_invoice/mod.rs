pub mod item_repository;
pub mod repository;
