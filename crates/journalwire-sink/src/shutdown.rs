//! Close signalling
//!
//! One watch channel shared by a sink and every connector it hands out.
//! This is the sink's only cross-task signal, and it is observed two
//! ways: synchronously (`is_closed`) at the head of read and reconnect
//! loops, and asynchronously (`wait`) racing an in-flight socket read or
//! reconnect sleep, so a consumer parked on a silent connection is
//! interrupted the moment the sink closes instead of waiting for bytes
//! that will never arrive.

use tokio::sync::watch;

#[derive(Clone)]
pub(crate) struct CloseSignal {
    sender: watch::Sender<bool>,
    receiver: watch::Receiver<bool>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self { sender, receiver }
    }

    /// Flip to closed and wake every waiter. Returns `true` for the one
    /// call that performed the transition.
    pub fn close(&self) -> bool {
        !self.sender.send_replace(true)
    }

    pub fn is_closed(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the signal is closed.
    pub async fn wait(&mut self) {
        loop {
            if *self.receiver.borrow() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }
}
