use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use snafu::prelude::*;

use super::error::variant::*;
use super::refresh::{Outcome, RefreshGate, Ticket};
use super::transport::{ReqwestTransport, Transport};
use super::types::{Request, Response};
use super::Result;
use crate::config::Config;

/// Auraflux HTTP API gateway.
///
/// Every request that fails with 401 triggers one access token refresh and is then
/// re-issued once. Concurrent 401s share a single refresh call.
#[derive(Debug, Clone)]
pub struct Gateway {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    base_url: String,
    refresh_path: String,
    transport: Arc<dyn Transport>,
    gate: Mutex<RefreshGate>,
}

impl Gateway {
    /// create a gateway using reqwest transport
    pub fn new<S: AsRef<str> + ?Sized>(base_url: &S, refresh_path: &S) -> Result<Self> {
        Self::with_transport(base_url, refresh_path, ReqwestTransport::new()?)
    }

    /// create a gateway from runtime config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.api_base_url.as_str(), config.refresh_path.as_str())
    }

    /// create a gateway on top of a custom transport
    pub fn with_transport<S, T>(base_url: &S, refresh_path: &S, transport: T) -> Result<Self>
    where
        S: AsRef<str> + ?Sized,
        T: Transport + 'static,
    {
        let base_url = base_url.as_ref();
        url::Url::parse(base_url).with_context(|_| InvalidBaseURL { url: base_url })?;

        Ok(Self {
            inner: Arc::new(Inner {
                base_url: base_url.trim_end_matches('/').to_string(),
                refresh_path: refresh_path.as_ref().to_string(),
                transport: Arc::new(transport),
                gate: Mutex::new(RefreshGate::default()),
            }),
        })
    }

    /// true while a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.gate().is_refreshing()
    }

    /// absolute url of an api path
    pub fn url_for(&self, path: &str) -> String {
        self.inner.url_for(path)
    }

    /// Send a request, transparently refreshing the access token once on 401.
    ///
    /// Non-401 error statuses and transport failures are returned unchanged. When the
    /// refresh itself fails the caller gets [`crate::api::Error::RefreshFailed`] and
    /// should send the user to login.
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        loop {
            let url = self.inner.url_for(request.path());
            let resp = self.inner.transport.execute(&url, &request).await?;

            if resp.status.is_success() {
                return Ok(resp);
            }

            ensure!(
                resp.status == StatusCode::UNAUTHORIZED && !request.is_retried(),
                HTTPStatusNotOK {
                    method: request.method().clone(),
                    url,
                    status_code: resp.status,
                }
            );

            log::debug!(
                "{} {} got 401, refresh access token and retry",
                request.method(),
                url
            );

            request.mark_retried();
            self.refresh().await?;
        }
    }

    /// GET a path and decode json response
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.send(Request::get(path)).await?.json()
    }

    /// POST json body to a path and decode json response
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(Request::post(path).json(body)?).await?.json()
    }

    async fn refresh(&self) -> Result<()> {
        let ticket = self.inner.gate().enter();

        let outcome = match ticket {
            Ticket::Waiter(rx) => {
                log::trace!("Waiting in-flight token refresh");
                rx.await.map_err(|_| RefreshInterrupted.build())?
            }
            Ticket::Leader => {
                // runs on its own task so a dropped caller can't leave the gate closed
                let inner = Arc::clone(&self.inner);
                match tokio::spawn(async move { inner.run_refresh().await }).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        log::warn!("Refresh task ended without result: {}", err);
                        // the task never settled, release the queued requests here
                        let waiters = self
                            .inner
                            .gate()
                            .settle(&Err(Arc::new(RefreshInterrupted.build())));
                        log::warn!("Reject {} queued requests", waiters);
                        return RefreshInterrupted.fail();
                    }
                }
            }
        };

        outcome.context(RefreshFailed)
    }
}

impl Inner {
    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn gate(&self) -> MutexGuard<'_, RefreshGate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(&self) -> Outcome {
        log::info!("Access token expired, refreshing ...");

        let request = Request::post(self.refresh_path.as_str());
        let url = self.url_for(request.path());

        let result = match self.transport.execute(&url, &request).await {
            Ok(resp) if resp.status.is_success() => Ok(()),
            Ok(resp) => HTTPStatusNotOK {
                method: request.method().clone(),
                url,
                status_code: resp.status,
            }
            .fail(),
            Err(err) => Err(err),
        };

        let outcome = result.map_err(Arc::new);

        let waiters = self.gate().settle(&outcome);

        match outcome {
            Ok(()) => log::info!(
                "Access token refreshed, resume {} queued requests",
                waiters
            ),
            Err(ref err) => log::warn!(
                "Refresh access token failed, reject {} queued requests: {}",
                waiters,
                err
            ),
        }

        outcome
    }
}
