mod backoff;
mod state;

pub use backoff::ReconnectConfig;
pub use state::ConnectionStatus;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures_util::{SinkExt, StreamExt};
use snafu::IntoError;
use tokio::sync::{broadcast, oneshot, watch};
use tokio_tungstenite::tungstenite::{
    protocol::{frame::coding::CloseCode, CloseFrame},
    Message,
};

use super::{
    connector::{socket_error, Connector, SocketError, TungsteniteConnector},
    message::InboundMessage,
};
use state::{CloseEvent, LiveSocket, ReconnectState};

/// messages kept for slow `messages()` receivers
const MESSAGE_BUFFER: usize = 64;

/// Resilient notification socket client.
///
/// Holds at most one live connection. When it drops without a clean 1000 close the
/// client reconnects with exponential backoff until [`ReconnectConfig::max_attempts`]
/// is reached, then stays [`ConnectionStatus::Failed`] until `connect` is called again.
///
/// Status, last message and last error are published through `watch` channels,
/// every decoded message is also sent on a `broadcast` channel.
/// Must be used inside a tokio runtime. Dropping the client closes it.
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: ReconnectConfig,
    connector: Arc<dyn Connector>,
    state: Mutex<ReconnectState>,
    status: watch::Sender<ConnectionStatus>,
    message: watch::Sender<Option<Arc<InboundMessage>>>,
    messages: broadcast::Sender<Arc<InboundMessage>>,
    error: watch::Sender<Option<Arc<SocketError>>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("connector", &self.inner.connector)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}

impl Client {
    /// Create a client using `tokio-tungstenite` connections
    pub fn new(config: ReconnectConfig) -> Self {
        Self::with_connector(config, TungsteniteConnector)
    }

    /// Create a client on top of a custom connector
    pub fn with_connector<C: Connector + 'static>(config: ReconnectConfig, connector: C) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let (message, _) = watch::channel(None);
        let (error, _) = watch::channel(None);
        let (messages, _) = broadcast::channel(MESSAGE_BUFFER);

        Self {
            inner: Arc::new(Inner {
                config,
                connector: Arc::new(connector),
                state: Mutex::new(ReconnectState::default()),
                status,
                message,
                messages,
                error,
            }),
        }
    }

    /// Open a socket to `url`.
    ///
    /// Never fails: errors are recorded and lead into the reconnect path. A pending
    /// reconnect timer is cancelled, a previous close request is forgotten, a live socket
    /// is replaced and the attempt counter starts from zero.
    pub fn connect<S: Into<String>>(&self, url: S) {
        let url = url.into();
        let mut state = self.inner.state();

        if state.cancel_timer() {
            log::debug!("Manual connect cancelled pending reconnect timer");
        }

        state.explicit_close_requested = false;
        state.attempt_count = 0;
        state.url = Some(url);

        self.inner.open(&mut state);
    }

    /// Close on purpose: cancel the pending reconnect and close the live socket with 1000.
    /// No reconnect happens after this until the next `connect`.
    pub fn close(&self) {
        let mut state = self.inner.state();

        state.explicit_close_requested = true;
        state.generation += 1;

        if state.cancel_timer() {
            log::debug!("Close cancelled pending reconnect timer");
        }

        if let Some(socket) = state.socket.take() {
            log::debug!("Ask socket task to close");
            // task already finished if receiver is gone
            let _ = socket.shutdown.send(());
        }

        self.inner.set_status(ConnectionStatus::Disconnected);
    }

    /// Watch connection status
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Watch most recent inbound message
    pub fn message(&self) -> watch::Receiver<Option<Arc<InboundMessage>>> {
        self.inner.message.subscribe()
    }

    /// Receive every inbound message decoded after this call.
    ///
    /// Unlike [`Client::message`] no message is skipped, unless the receiver lags more
    /// than the channel buffer behind.
    pub fn messages(&self) -> broadcast::Receiver<Arc<InboundMessage>> {
        self.inner.messages.subscribe()
    }

    /// Watch most recent transport or parse error
    pub fn error(&self) -> watch::Receiver<Option<Arc<SocketError>>> {
        self.inner.error.subscribe()
    }

    /// Current connection status
    pub fn current_status(&self) -> ConnectionStatus {
        *self.inner.status.borrow()
    }

    /// Reconnect attempts made since the last successful open
    pub fn attempts(&self) -> u32 {
        self.inner.state().attempt_count
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ReconnectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                log::debug!("Connection status {:?} -> {:?}", current, status);
                *current = status;
                true
            }
        });
    }

    fn record_error(&self, err: SocketError) {
        self.error.send_replace(Some(Arc::new(err)));
    }

    /// Start a socket task for the current url, superseding any live one.
    fn open(self: &Arc<Self>, state: &mut ReconnectState) {
        let url = match state.url.clone() {
            Some(url) => url,
            None => return,
        };

        if let Some(old) = state.socket.take() {
            log::debug!("Drop superseded socket");
            old.task.abort();
        }

        state.generation += 1;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(self).socket_background(
            state.generation,
            url,
            shutdown_rx,
        ));

        state.socket = Some(LiveSocket { task, shutdown });
    }

    async fn socket_background(
        self: Arc<Self>,
        generation: u64,
        url: String,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        log::debug!("Socket task #{} start, url {}", generation, url);

        let mut socket = match self.connector.connect(&url).await {
            Ok(socket) => socket,
            Err(err) => {
                log::warn!("{}", err);
                if self.state().is_current(generation) {
                    self.record_error(socket_error::ConnectFailed.into_error(err));
                }
                self.on_close(generation, CloseEvent::abnormal());
                return;
            }
        };

        if !self.on_open(generation) {
            log::debug!("Socket #{} superseded before open, drop it", generation);
            return;
        }

        let close = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "client closed".into(),
                    };
                    if let Err(err) = socket.send(Message::Close(Some(frame))).await {
                        log::debug!("Send close frame failed: {}", err);
                    }
                    log::info!("Socket closed on request");
                    return;
                }

                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.on_text(generation, &text),
                    Some(Ok(Message::Close(frame))) => {
                        log::trace!("Received close frame {:?}", frame);
                        break CloseEvent::from_frame(frame.as_ref());
                    }
                    Some(Ok(other)) => {
                        log::trace!("Ignore non-text frame {:?}", other);
                    }
                    Some(Err(err)) => {
                        log::warn!("Socket #{} broken: {}", generation, err);
                        if self.state().is_current(generation) {
                            self.record_error(socket_error::Transport.into_error(err));
                        }
                        break CloseEvent::abnormal();
                    }
                    None => {
                        log::warn!("Socket #{} ended without close frame", generation);
                        break CloseEvent::abnormal();
                    }
                }
            }
        };

        self.on_close(generation, close);
    }

    fn on_open(&self, generation: u64) -> bool {
        let mut state = self.state();
        if !state.is_current(generation) {
            return false;
        }

        state.attempt_count = 0;
        self.set_status(ConnectionStatus::Connected);

        log::info!("Socket #{} connected", generation);

        true
    }

    fn on_text(&self, generation: u64, text: &str) {
        if !self.state().is_current(generation) {
            return;
        }

        match InboundMessage::decode(text) {
            Ok(message) => {
                log::trace!("Received {} message: {}", message.kind, message.event_type);
                let message = Arc::new(message);
                // no receiver subscribed is fine
                let _ = self.messages.send(Arc::clone(&message));
                self.message.send_replace(Some(message));
            }
            Err(err) => {
                log::warn!("Drop malformed frame: {}", err);
                self.record_error(socket_error::ParseMessageFailed.into_error(err));
            }
        }
    }

    fn on_close(self: &Arc<Self>, generation: u64, event: CloseEvent) {
        let mut state = self.state();

        if state.generation != generation {
            log::trace!("Ignore close of stale socket #{}", generation);
            return;
        }

        state.socket = None;

        if state.explicit_close_requested {
            self.set_status(ConnectionStatus::Disconnected);
            return;
        }

        if event.is_normal() {
            log::info!("Socket closed normally");
            self.set_status(ConnectionStatus::Disconnected);
            return;
        }

        log::warn!(
            "Socket closed abnormally with code {}, clean: {}",
            event.code,
            event.clean
        );

        self.schedule_reconnect(&mut state);
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut ReconnectState) {
        if state.attempt_count >= self.config.max_attempts {
            log::warn!(
                "Reached max reconnect attempts {}, give up",
                self.config.max_attempts
            );
            self.set_status(ConnectionStatus::Failed);
            return;
        }

        let delay = self
            .config
            .delay_for_attempt(state.attempt_count, &mut rand::thread_rng());
        state.attempt_count += 1;

        log::info!(
            "Reconnect attempt {}/{} in {:?}",
            state.attempt_count,
            self.config.max_attempts,
            delay
        );

        self.set_status(ConnectionStatus::Reconnecting);

        let inner = Arc::clone(self);
        let generation = state.generation;
        state.pending_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.reconnect_fired(generation);
        }));
    }

    fn reconnect_fired(self: &Arc<Self>, generation: u64) {
        let mut state = self.state();
        if !state.is_current(generation) {
            return;
        }

        // this task is the timer, forget it without aborting
        state.pending_timer = None;
        self.open(&mut state);
    }
}
