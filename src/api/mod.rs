//! auraflux api gateway

mod client;
mod error;
mod refresh;
mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use client::Gateway;
pub use error::Error;
pub use transport::{ReqwestTransport, Transport};
pub use types::{Request, Response};

/// Result type for api module
pub type Result<T> = std::result::Result<T, Error>;
