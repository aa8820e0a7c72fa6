/// Database model definitions.
pub mod models;
/// Persistence backends for rooms and player statistics.
pub mod room_store;
/// Storage abstraction layer for database operations.
pub mod storage;
