// EconOps API module.
// Provides the signing client, its transport seam and request/response types.

pub mod client;
pub mod transport;
pub mod types;

pub use client::{CacheOutcome, Client, ClientConfig, DEFAULT_BASE_URL, Dispatched};
pub use transport::{HttpTransport, Transport};
pub use types::*;
