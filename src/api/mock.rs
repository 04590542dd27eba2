//! In-memory transport for tests: every path answers 401 until the refresh endpoint is called.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use bytes::Bytes;
use reqwest::StatusCode;

use super::{Error, Request, Response, Result, Transport};

pub(crate) const BASE_URL: &str = "http://api.test";
pub(crate) const REFRESH_PATH: &str = "/users/token/refresh/";

#[derive(Debug)]
pub(crate) struct MockTransport {
    calls: Mutex<Vec<String>>,
    routes: Mutex<HashMap<String, (StatusCode, Bytes)>>,
    broken: Mutex<HashSet<String>>,
    refresh_calls: AtomicUsize,
    panic_refresh: AtomicBool,
    authorized: AtomicBool,
    refresh_status: StatusCode,
    refresh_delay: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            routes: Mutex::default(),
            broken: Mutex::default(),
            refresh_calls: AtomicUsize::new(0),
            panic_refresh: AtomicBool::new(false),
            authorized: AtomicBool::new(false),
            refresh_status: StatusCode::OK,
            refresh_delay: Duration::ZERO,
        }
    }
}

impl MockTransport {
    pub fn authorized() -> Self {
        let transport = Self::default();
        transport.authorized.store(true, Ordering::SeqCst);
        transport
    }

    pub fn refresh_status(mut self, status: StatusCode) -> Self {
        self.refresh_status = status;
        self
    }

    pub fn refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// fixed answer for a path, ignores authorization
    pub fn route(&self, path: &str, status: StatusCode) {
        self.route_body(path, status, "null");
    }

    pub fn route_body(&self, path: &str, status: StatusCode, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, Bytes::from_static(body.as_bytes())));
    }

    /// requests to `path` fail before any response arrives
    pub fn break_route(&self, path: &str) {
        self.broken.lock().unwrap().insert(path.to_string());
    }

    /// the next refresh call panics after its delay
    pub fn panic_next_refresh(&self) {
        self.panic_refresh.store(true, Ordering::SeqCst);
    }

    pub fn expire(&self) {
        self.authorized.store(false, Ordering::SeqCst);
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn execute(&self, url: &str, request: &Request) -> Result<Response> {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url).to_string();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method(), path));

        if self.broken.lock().unwrap().contains(&path) {
            let source = reqwest::Client::new().get("not a url").build().unwrap_err();
            return Err(Error::RequestFailed {
                method: request.method().clone(),
                url: url.to_string(),
                source,
            });
        }

        if path == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            if self.panic_refresh.swap(false, Ordering::SeqCst) {
                panic!("refresh endpoint crashed");
            }
            if self.refresh_status.is_success() {
                self.authorized.store(true, Ordering::SeqCst);
            }
            return Ok(Response {
                status: self.refresh_status,
                body: Bytes::new(),
            });
        }

        if let Some((status, body)) = self.routes.lock().unwrap().get(&path).cloned() {
            return Ok(Response { status, body });
        }

        if self.is_authorized() {
            let body = serde_json::to_vec(&serde_json::json!({ "path": path })).unwrap();
            Ok(Response {
                status: StatusCode::OK,
                body: body.into(),
            })
        } else {
            Ok(Response {
                status: StatusCode::UNAUTHORIZED,
                body: Bytes::new(),
            })
        }
    }
}
