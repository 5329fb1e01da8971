// Cache module for local filesystem caching.
// Stores API responses keyed by request signature to skip repeat network calls.

pub mod paths;
pub mod store;

pub use store::{CacheStats, CacheWrite, CachedData, ResponseCache};
