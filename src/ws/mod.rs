//! Notification websocket client with auto reconnect

mod client;
mod connector;
mod message;

pub use client::{Client, ConnectionStatus, ReconnectConfig};
pub use connector::{ConnectError, Connector, Socket, SocketError, TungsteniteConnector};
pub use message::{InboundMessage, ParseMessageError};
