use std::fmt::Debug;

use futures_util::{Sink, Stream};
use snafu::prelude::*;
use tokio_tungstenite as websocket;

use websocket::tungstenite::{Error as WsError, Message};

use super::message::ParseMessageError;

/// Error when connect to websocket gateway
#[derive(Debug, Snafu)]
#[snafu(
    display("connect ws gateway {url} failed: {source}"),
    visibility(pub(crate)),
    module(error),
    context(suffix(false))
)]
pub struct ConnectError {
    /// connected url
    pub url: String,
    /// source error
    pub source: WsError,
}

/// Error recorded by the socket client, never terminates it by itself
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(socket_error), context(suffix(false)))]
pub enum SocketError {
    /// open the connection failed
    #[snafu(display("{source}"))]
    ConnectFailed {
        /// source error
        source: ConnectError,
    },

    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Transport {
        /// source error
        source: WsError,
    },

    /// received text frame is not a valid message
    #[snafu(display("parse frame to message failed: {source}"))]
    ParseMessageFailed {
        /// source error
        source: ParseMessageError,
    },
}

/// A live websocket, tungstenite frames in both directions
pub trait Socket:
    Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin
{
}

impl<T> Socket for T where
    T: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + Unpin
{
}

/// Opens websocket connections for the socket client
#[async_trait::async_trait]
pub trait Connector: Debug + Send + Sync {
    /// open a socket to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, ConnectError>;
}

/// Plain `tokio-tungstenite` connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, ConnectError> {
        log::debug!("Connecting gateway: {}", url);

        let (ws, _) = websocket::connect_async(url)
            .await
            .with_context(|_| error::Connect { url })?;

        Ok(Box::new(ws))
    }
}
