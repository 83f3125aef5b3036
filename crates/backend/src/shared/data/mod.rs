pub mod db;
pub mod sea_orm_store;
pub mod storage;

#[cfg(test)]
pub mod memory_store;
