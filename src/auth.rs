//! Login state on top of the api gateway

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    api::{Gateway, Request},
    error, Result,
};

/// users status endpoint, answers the current user when the session cookie is valid
pub const STATUS_PATH: &str = "/users/status/";
/// login endpoint, sets the session cookies
pub const LOGIN_PATH: &str = "/users/login/";
/// logout endpoint, clears the session cookies
pub const LOGOUT_PATH: &str = "/users/logout/";

/// Logged in user, fields other than id/username are kept as is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// user id
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    /// username
    #[serde(default)]
    pub username: Option<String>,
    /// remaining fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// Current user of the app, shared by clones
#[derive(Debug, Clone)]
pub struct AuthStore {
    gateway: Gateway,
    user: Arc<RwLock<Option<User>>>,
    loading: Arc<AtomicBool>,
}

/// Clears the loading flag when the status check ends, even if it is cancelled
struct Loading<'a>(&'a AtomicBool);

impl<'a> Loading<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AuthStore {
    /// create a logged out store
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            user: Arc::default(),
            loading: Arc::default(),
        }
    }

    /// current user
    pub fn user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// true if a user is stored
    pub fn is_logged_in(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// true while a status check is running
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    fn set_user(&self, user: Option<User>) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Ask the backend who is logged in, any failure counts as logged out
    pub async fn check_status(&self) -> bool {
        let _loading = Loading::start(&self.loading);

        match self.gateway.get_json::<Option<User>>(STATUS_PATH).await {
            Ok(user) => {
                log::debug!("Auth status checked, logged in: {}", user.is_some());
                self.set_user(user);
            }
            Err(err) => {
                log::warn!("Check auth status failed: {}", err);
                self.set_user(None);
            }
        }

        self.is_logged_in()
    }

    /// Log in with credentials, the backend keeps the session in http-only cookies
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let result = self
            .gateway
            .post_json::<_, Option<User>>(LOGIN_PATH, &Credentials { username, password })
            .await
            .context(error::CallAPIFailed)
            .and_then(|user| user.context(error::LoginRejected { username }));

        match result {
            Ok(user) => {
                log::info!("Logged in as {}", username);
                self.set_user(Some(user.clone()));
                Ok(user)
            }
            Err(err) => {
                self.set_user(None);
                Err(err)
            }
        }
    }

    /// Log out on the server, local state is cleared even if the call fails
    pub async fn logout(&self) {
        if let Err(err) = self.gateway.send(Request::post(LOGOUT_PATH)).await {
            log::warn!("Logout failed on server, clear local state anyway: {}", err);
        }

        self.set_user(None);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::*;
    use crate::api::mock::{MockTransport, BASE_URL, REFRESH_PATH};

    fn store(transport: MockTransport) -> (AuthStore, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let gateway =
            Gateway::with_transport(BASE_URL, REFRESH_PATH, Arc::clone(&transport)).unwrap();
        (AuthStore::new(gateway), transport)
    }

    #[tokio::test]
    async fn status_sets_user() {
        let (auth, transport) = store(MockTransport::authorized());
        transport.route_body(
            STATUS_PATH,
            StatusCode::OK,
            r#"{"id": 4, "username": "ada", "email": "ada@example.com"}"#,
        );

        assert!(auth.check_status().await);
        let user = auth.user().unwrap();
        assert_eq!(user.username.as_deref(), Some("ada"));
        assert_eq!(user.extra["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn failed_refresh_logs_out() {
        let (auth, transport) =
            store(MockTransport::default().refresh_status(StatusCode::UNAUTHORIZED));

        assert!(!auth.check_status().await);
        assert!(auth.user().is_none());
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loading_while_status_is_checked() {
        let (auth, transport) =
            store(MockTransport::default().refresh_delay(Duration::from_millis(200)));
        assert!(!auth.is_loading());

        let check = tokio::spawn({
            let auth = auth.clone();
            async move { auth.check_status().await }
        });
        tokio::task::yield_now().await;
        assert!(auth.is_loading());

        assert!(check.await.unwrap());
        assert!(!auth.is_loading());
        assert_eq!(transport.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn login_without_user_is_rejected() {
        let (auth, transport) = store(MockTransport::authorized());
        transport.route(LOGIN_PATH, StatusCode::OK);

        let err = auth.login("ada", "secret").await.unwrap_err();
        assert!(matches!(err, crate::Error::LoginRejected { .. }));
        assert!(err.is_unauthorized());
        assert!(!auth.is_logged_in());
    }

    #[tokio::test]
    async fn login_then_logout() {
        let (auth, transport) = store(MockTransport::authorized());
        transport.route_body(
            LOGIN_PATH,
            StatusCode::OK,
            r#"{"id": 4, "username": "ada"}"#,
        );
        transport.route(LOGOUT_PATH, StatusCode::INTERNAL_SERVER_ERROR);

        let user = auth.login("ada", "secret").await.unwrap();
        assert_eq!(user.id, Some(serde_json::json!(4)));
        assert!(auth.is_logged_in());

        auth.logout().await;
        assert!(!auth.is_logged_in());
        assert_eq!(
            transport.calls(),
            vec!["POST /users/login/", "POST /users/logout/"]
        );
    }
}
