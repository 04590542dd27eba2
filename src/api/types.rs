//! Request and response types of the api gateway

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use snafu::prelude::*;

use super::error::variant::*;
use super::Result;

/// Description of an outbound api call, path is relative to the gateway base url
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    retried: bool,
}

impl Request {
    /// create a request with method and path
    pub fn new<P: Into<String>>(method: Method, path: P) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    /// create a GET request
    pub fn get<P: Into<String>>(path: P) -> Self {
        Self::new(Method::GET, path)
    }

    /// create a POST request
    pub fn post<P: Into<String>>(path: P) -> Self {
        Self::new(Method::POST, path)
    }

    /// create a PUT request
    pub fn put<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PUT, path)
    }

    /// create a PATCH request
    pub fn patch<P: Into<String>>(path: P) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// create a DELETE request
    pub fn delete<P: Into<String>>(path: P) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// append a query pair
    pub fn query<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// set json body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let body = serde_json::to_vec(body).context(SerializeBodyFailed)?;
        self.body = Some(body.into());
        Ok(self)
    }

    /// http method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// path relative to base url
    pub fn path(&self) -> &str {
        &self.path
    }

    /// query pairs
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    /// encoded json body
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// true if this request already went through a token refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Response of an api call
#[derive(Debug, Clone)]
pub struct Response {
    /// http status code
    pub status: StatusCode,
    /// raw body
    pub body: Bytes,
}

impl Response {
    /// decode body as json
    pub fn json<R: DeserializeOwned>(&self) -> Result<R> {
        serde_json::from_slice(&self.body).with_context(|_| ParseBodyFailed {
            body: self.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_query_and_body() {
        let req = Request::post("/search/results/")
            .query("page", "2")
            .json(&serde_json::json!({ "q": "rust" }))
            .unwrap();

        assert_eq!(req.method(), &Method::POST);
        assert_eq!(req.path(), "/search/results/");
        assert_eq!(req.query_pairs(), &[("page".to_string(), "2".to_string())]);
        assert_eq!(req.body().unwrap().as_ref(), br#"{"q":"rust"}"#);
        assert!(!req.is_retried());
    }

    #[test]
    fn bad_json_body_reports_raw_bytes() {
        let resp = Response {
            status: StatusCode::OK,
            body: Bytes::from_static(b"<html>"),
        };

        let err = resp.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, crate::api::Error::ParseBodyFailed { .. }));
    }
}
