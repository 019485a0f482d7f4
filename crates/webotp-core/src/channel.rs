use std::fmt;

use thiserror::Error;
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError},
};

use crate::types::ReceiverEvent;

/// Broadcast event stream type used by observers.
pub type EventStream = broadcast::Receiver<ReceiverEvent>;

/// Errors returned by receiver channel operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverChannelError {
    /// The runtime input receiver is closed.
    #[error("input channel is closed")]
    InputChannelClosed,
    /// The runtime input queue is full.
    #[error("input channel is full")]
    InputChannelFull,
}

/// Input/event channel pair shared by the runtime and its handles.
///
/// `I` is the runtime's input type; every callback re-enters the runtime
/// through the same queue.
pub struct ReceiverChannels<I> {
    input_tx: mpsc::Sender<I>,
    event_tx: broadcast::Sender<ReceiverEvent>,
}

impl<I> Clone for ReceiverChannels<I> {
    fn clone(&self) -> Self {
        Self {
            input_tx: self.input_tx.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<I> fmt::Debug for ReceiverChannels<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverChannels")
            .field("input_capacity", &self.input_tx.capacity())
            .field("event_subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

impl<I> ReceiverChannels<I> {
    /// Create a new channel set and return it with the input receiver.
    pub fn new(input_buffer: usize, event_buffer: usize) -> (Self, mpsc::Receiver<I>) {
        let (input_tx, input_rx) = mpsc::channel(input_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (Self { input_tx, event_tx }, input_rx)
    }

    /// Clone the input sender.
    pub fn input_sender(&self) -> mpsc::Sender<I> {
        self.input_tx.clone()
    }

    /// Subscribe to emitted receiver events.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Queue one input for the runtime, waiting for capacity.
    pub async fn send_input(&self, input: I) -> Result<(), ReceiverChannelError> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| ReceiverChannelError::InputChannelClosed)
    }

    /// Queue one input without waiting; used from synchronous callbacks.
    pub fn try_send_input(&self, input: I) -> Result<(), ReceiverChannelError> {
        self.input_tx.try_send(input).map_err(|err| match err {
            TrySendError::Full(_) => ReceiverChannelError::InputChannelFull,
            TrySendError::Closed(_) => ReceiverChannelError::InputChannelClosed,
        })
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: ReceiverEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReceiverLifecycleState;

    #[tokio::test]
    async fn sends_inputs_to_receiver() {
        let (channels, mut rx) = ReceiverChannels::<&'static str>::new(8, 8);
        channels
            .send_input("listen")
            .await
            .expect("input send should work");

        assert_eq!(rx.recv().await, Some("listen"));
    }

    #[tokio::test]
    async fn try_send_reports_full_and_closed_queues() {
        let (channels, rx) = ReceiverChannels::<u8>::new(1, 4);
        channels.try_send_input(1).expect("first input fits");
        assert_eq!(
            channels.try_send_input(2),
            Err(ReceiverChannelError::InputChannelFull)
        );

        drop(rx);
        assert_eq!(
            channels.try_send_input(3),
            Err(ReceiverChannelError::InputChannelClosed)
        );
    }

    #[tokio::test]
    async fn fans_out_events_to_subscribers() {
        let (channels, _rx) = ReceiverChannels::<()>::new(4, 16);
        let mut a = channels.subscribe();
        let mut b = channels.subscribe();

        channels.emit(ReceiverEvent::StateChanged {
            state: ReceiverLifecycleState::Retrieving,
        });

        let event_a = a.recv().await.expect("subscriber a should receive event");
        let event_b = b.recv().await.expect("subscriber b should receive event");
        assert_eq!(event_a, event_b);
    }
}
