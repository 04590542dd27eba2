use std::fmt::Debug;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use snafu::prelude::*;

use super::error::variant::*;
use super::types::{Request, Response};
use super::Result;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Executes a single http exchange, the gateway builds retry and refresh logic on top of it.
///
/// Implementations return `Ok` for every response that arrived, whatever its status code.
#[async_trait::async_trait]
pub trait Transport: Debug + Send + Sync {
    /// send `request` to absolute `url`
    async fn execute(&self, url: &str, request: &Request) -> Result<Response>;
}

/// reqwest backed transport, keeps a cookie store so the http-only session cookie
/// set by login/refresh is sent with every later request
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// create transport with default settings
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .gzip(true)
            .deflate(true)
            .cookie_store(true)
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .build()
            .context(ClientCreateFailed)?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, url: &str, request: &Request) -> Result<Response> {
        let method = request.method().clone();
        let mut req = self.client.request(method.clone(), url);

        if !request.query_pairs().is_empty() {
            req = req.query(request.query_pairs());
        }

        if let Some(body) = request.body() {
            req = req.body(body.clone());
        }

        let req = req.build().context(BuildRequestFailed)?;

        let resp = self
            .client
            .execute(req)
            .await
            .with_context(|_| RequestFailed {
                method: method.clone(),
                url,
            })?;

        let status = resp.status();

        let body = resp
            .bytes()
            .await
            .with_context(|_| RequestFailed { method, url })?;

        log::trace!("{} {} -> {}", request.method(), url, status);

        Ok(Response { status, body })
    }
}

#[async_trait::async_trait]
impl<T> Transport for std::sync::Arc<T>
where
    T: Transport + ?Sized,
{
    async fn execute(&self, url: &str, request: &Request) -> Result<Response> {
        (**self).execute(url, request).await
    }
}
