pub mod database;
pub mod models;
pub mod pool_repository;
pub mod snapshot_repository;
pub mod sqlite_store;
pub mod token_repository;

pub use database::Database;
pub use models::Token;
pub use pool_repository::PoolRepository;
pub use snapshot_repository::SnapshotRepository;
pub use sqlite_store::SqliteStore;
pub use token_repository::TokenRepository;
