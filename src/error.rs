//! crate error types

use snafu::prelude::*;

use super::api::Error as APIError;
use super::config::Error as ConfigError;

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// configuration missing or invalid
    #[snafu(display("invalid config: {source}"))]
    InvalidConfig {
        /// source error
        source: ConfigError,
    },

    /// Call auraflux api failed
    #[snafu(display("call auraflux api failed: {source}"))]
    CallAPIFailed {
        /// source error
        source: APIError,
    },

    /// login endpoint answered without a user
    #[snafu(display("login as {username} rejected"))]
    LoginRejected {
        /// submitted username
        username: String,
    },
}

impl Error {
    /// true if the user has to log in again
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::CallAPIFailed { source } => source.is_unauthorized(),
            Self::LoginRejected { .. } => true,
            Self::InvalidConfig { .. } => false,
        }
    }
}
