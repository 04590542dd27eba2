use std::{collections::VecDeque, sync::Arc};

use tokio::sync::oneshot;

use super::Error;

/// settle result of one refresh call, shared by every waiter
pub(crate) type Outcome = std::result::Result<(), Arc<Error>>;

/// What a request that hit 401 has to do.
#[derive(Debug)]
pub(crate) enum Ticket {
    /// no refresh in flight, caller must run one
    Leader,
    /// refresh already in flight, wait for its outcome
    Waiter(oneshot::Receiver<Outcome>),
}

/// Guards at most one in-flight refresh call, queues the rest.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
    is_refreshing: bool,
    queue: VecDeque<oneshot::Sender<Outcome>>,
}

impl RefreshGate {
    pub fn enter(&mut self) -> Ticket {
        if self.is_refreshing {
            let (tx, rx) = oneshot::channel();
            self.queue.push_back(tx);
            log::trace!("Refresh in flight, queued as waiter #{}", self.queue.len());
            Ticket::Waiter(rx)
        } else {
            self.is_refreshing = true;
            Ticket::Leader
        }
    }

    /// Clear the flag and settle every waiter in FIFO order, returns the waiter count.
    pub fn settle(&mut self, outcome: &Outcome) -> usize {
        self.is_refreshing = false;

        let count = self.queue.len();
        for waiter in self.queue.drain(..) {
            // waiter side may be gone if its caller was dropped
            let _ = waiter.send(outcome.clone());
        }

        count
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing
    }
}
