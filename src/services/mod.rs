// Service exports
pub mod cache;
pub mod listings;
pub mod memory;
pub mod postgres;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use listings::{ListingClient, ListingError};
pub use memory::InMemoryStore;
pub use postgres::{PostgresClient, PostgresError};
