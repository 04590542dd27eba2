use std::sync::Arc;

use reqwest::StatusCode;
use snafu::prelude::*;

/// API Error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(variant), context(suffix(false)))]
pub enum Error {
    /// configured api base url can't be parsed
    #[snafu(display("invalid api base url {url}: {source}"))]
    InvalidBaseURL {
        /// configured url
        url: String,
        /// source error
        source: url::ParseError,
    },

    /// create HTTP client failed
    #[snafu(display("create api client failed: {source}"))]
    ClientCreateFailed {
        /// source error
        source: reqwest::Error,
    },

    /// build api request failed
    #[snafu(display("build request failed: {source}"))]
    BuildRequestFailed {
        /// source error
        source: reqwest::Error,
    },

    /// serialize request body as json failed
    #[snafu(display("serialize request body failed: {source}"))]
    SerializeBodyFailed {
        /// source error
        source: serde_json::Error,
    },

    /// send api request failed
    #[snafu(display("{} url {url} failed: {source}", method.as_str()))]
    RequestFailed {
        /// http method
        method: reqwest::Method,
        /// target url
        url: String,
        /// source http error
        source: reqwest::Error,
    },

    /// http response of api request is not a success status
    #[snafu(display("{} url {url} got http status code {status_code}", method.as_str()))]
    HTTPStatusNotOK {
        /// http method
        method: reqwest::Method,
        /// request url
        url: String,
        /// received http status code
        status_code: StatusCode,
    },

    /// parse response body of api request as target json type failed
    #[snafu(display("parse response body {body:?} failed: {source}"))]
    ParseBodyFailed {
        /// http response body
        body: bytes::Bytes,
        /// source parse error
        source: serde_json::Error,
    },

    /// token refresh failed, every request waiting on it receives the same error
    #[snafu(display("refresh access token failed: {source}"))]
    RefreshFailed {
        /// error of the refresh call, shared by the waiting batch
        source: Arc<Error>,
    },

    /// the refresh task ended without settling its waiters
    #[snafu(display("refresh access token interrupted"))]
    RefreshInterrupted,
}

impl Error {
    /// http status code carried by this error, if any
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::HTTPStatusNotOK { status_code, .. } => Some(*status_code),
            Self::RefreshFailed { source } => source.status_code(),
            _ => None,
        }
    }

    /// true if this error means the user must authenticate again
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::RefreshFailed { .. } | Self::RefreshInterrupted)
            || self.status_code() == Some(StatusCode::UNAUTHORIZED)
    }
}
