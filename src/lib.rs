// EconOps API client library.
// Signs requests, caches responses on disk and sends them to the EconOps API.

pub mod api;
pub mod cache;
pub mod cli;
pub mod error;
pub mod signature;

pub use api::{Client, ClientConfig};
pub use cache::ResponseCache;
pub use error::{EconopsError, Result};
pub use signature::{call_signature, canonical_json};
