//! HTTP plumbing towards the Tdarr server.

pub mod request;
pub mod transport;

pub use request::{RequestClient, API_KEY_HEADER};
pub use transport::{RetryTransport, RoundTrip, DEFAULT_BACKOFF};
