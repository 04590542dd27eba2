//! Latest notification per event type, fed by the socket client.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::ws::InboundMessage;

/// discriminator of notification messages
pub const NOTIFICATION_TYPE: &str = "send_notification";

/// Notification payload, carried in `data` of a `send_notification` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// notification id
    pub id: i64,
    /// short title
    pub title: String,
    /// body text
    pub message: String,
    /// server side timestamp
    pub timestamp: String,
}

/// Notification history, keeps the newest payload of each event type.
///
/// Cheap to clone, clones share the same history.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    notifications: Arc<RwLock<HashMap<String, NotificationPayload>>>,
}

impl NotificationStore {
    /// create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message if it is a notification, returns true when stored
    pub fn process(&self, message: &InboundMessage) -> bool {
        if message.kind != NOTIFICATION_TYPE {
            log::trace!("Skip {} message", message.kind);
            return false;
        }

        let payload: NotificationPayload = match serde_json::from_value(message.data.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!(
                    "Invalid payload of {} notification: {}",
                    message.event_type,
                    err
                );
                return false;
            }
        };

        log::info!(
            "Notification {} received: {}",
            message.event_type,
            payload.title
        );

        self.notifications
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(message.event_type.clone(), payload);

        true
    }

    /// newest payload of `event_type`
    pub fn get(&self, event_type: &str) -> Option<NotificationPayload> {
        self.notifications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_type)
            .cloned()
    }

    /// copy of the whole history
    pub fn snapshot(&self) -> HashMap<String, NotificationPayload> {
        self.notifications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// number of event types seen
    pub fn len(&self) -> usize {
        self.notifications
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// true if nothing stored yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a task feeding every message received on `messages` into this store.
    ///
    /// The task ends when the socket client that owns the channel is gone.
    pub fn watch(
        &self,
        mut messages: broadcast::Receiver<Arc<InboundMessage>>,
    ) -> JoinHandle<()> {
        let store = self.clone();

        tokio::spawn(async move {
            loop {
                match messages.recv().await {
                    Ok(message) => {
                        store.process(&message);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Notification pump lagged, {} messages skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            log::debug!("Message channel closed, notification pump stop");
        })
    }
}
