use tokio::{sync::oneshot, task::JoinHandle};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};

/// close code browsers report when the connection dropped without a close frame
pub(crate) const ABNORMAL_CLOSURE: u16 = 1006;
/// close code of a close frame without status
pub(crate) const NO_STATUS_RECEIVED: u16 = 1005;

/// Connection status of the socket client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// socket open
    Connected,
    /// initial state, or closed normally / on request
    Disconnected,
    /// waiting for the next reconnect attempt, or connecting for it
    Reconnecting,
    /// reconnect attempts exhausted, needs a manual `connect`
    Failed,
}

impl ConnectionStatus {
    /// true only for connected
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// How a socket went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CloseEvent {
    pub code: u16,
    pub clean: bool,
}

impl CloseEvent {
    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            clean: false,
        }
    }

    pub fn from_frame(frame: Option<&CloseFrame<'_>>) -> Self {
        Self {
            code: frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code)),
            clean: true,
        }
    }

    pub fn is_normal(&self) -> bool {
        self.clean && self.code == u16::from(CloseCode::Normal)
    }
}

/// Socket task of one generation
#[derive(Debug)]
pub(crate) struct LiveSocket {
    pub task: JoinHandle<()>,
    pub shutdown: oneshot::Sender<()>,
}

#[derive(Debug, Default)]
pub(crate) struct ReconnectState {
    pub url: Option<String>,
    pub attempt_count: u32,
    pub pending_timer: Option<JoinHandle<()>>,
    pub explicit_close_requested: bool,
    /// bumped on every open and on close, late events of older sockets are discarded
    pub generation: u64,
    pub socket: Option<LiveSocket>,
}

impl ReconnectState {
    pub fn cancel_timer(&mut self) -> bool {
        match self.pending_timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && !self.explicit_close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_clean_1000_is_normal() {
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };

        assert!(CloseEvent::from_frame(Some(&normal)).is_normal());
        assert!(!CloseEvent::from_frame(Some(&away)).is_normal());
        assert!(!CloseEvent::from_frame(None).is_normal());
        assert!(!CloseEvent::abnormal().is_normal());
        assert!(!CloseEvent {
            code: 1000,
            clean: false
        }
        .is_normal());
    }
}
