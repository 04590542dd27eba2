//! # Auraflux
//!
//! Client core of the Auraflux research assistant: a notification websocket that
//! reconnects with exponential backoff, and an api gateway that refreshes the access
//! token once when requests start failing with 401.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod notification;
pub mod ws;

mod error;
pub use config::Config;
pub use error::{Error, Result};

use snafu::prelude::*;
use tokio::task::JoinHandle;

use auth::AuthStore;
use notification::NotificationStore;

/// Auraflux client instance
#[derive(Debug)]
pub struct Auraflux {
    config: Config,
    gateway: api::Gateway,
    socket: ws::Client,
    notifications: NotificationStore,
    auth: AuthStore,
    pump: Option<JoinHandle<()>>,
}

impl Auraflux {
    /// Create client instance from config
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context(error::InvalidConfig)?;

        let gateway = api::Gateway::from_config(&config).context(error::CallAPIFailed)?;
        let socket = ws::Client::new(config.reconnect());

        log::info!("Create api gateway and socket client success");

        Ok(Self {
            auth: AuthStore::new(gateway.clone()),
            gateway,
            socket,
            notifications: NotificationStore::new(),
            config,
            pump: None,
        })
    }

    /// Create client instance from env vars, see [`config`] for names
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env().context(error::InvalidConfig)?)
    }

    /// Connect notification socket and start collecting notifications.
    ///
    /// Must be called inside a tokio runtime. Calling it again reconnects.
    pub fn start(&mut self) {
        if self.pump.is_none() {
            self.pump = Some(self.notifications.watch(self.socket.messages()));
        }

        log::info!("Connecting notification socket {}", self.config.ws_url);

        self.socket.connect(self.config.ws_url.as_str());
    }

    /// Close notification socket and stop collecting
    pub fn shutdown(&mut self) {
        self.socket.close();

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }

        log::info!("Auraflux client shutdown");
    }

    /// runtime config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// api gateway
    pub fn gateway(&self) -> &api::Gateway {
        &self.gateway
    }

    /// notification socket
    pub fn socket(&self) -> &ws::Client {
        &self.socket
    }

    /// notification history
    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    /// login state
    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }
}
