//! Multicast notification channels with explicit completion.
//!
//! [`StateChannel`] replays its latest value to every new subscriber;
//! [`EventChannel`] only delivers what is emitted after a subscriber joined.
//! Completing either drops the sending half, after which subscribers see the
//! channel as closed.

use tokio::sync::{broadcast, watch};

/// Latest-value channel backed by `tokio::sync::watch`.
#[derive(Debug)]
pub struct StateChannel<T> {
    sender: Option<watch::Sender<T>>,
    last: T,
}

impl<T: Clone> StateChannel<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial.clone());
        Self {
            sender: Some(sender),
            last: initial,
        }
    }

    /// Replace the current value. Ignored once completed.
    pub fn publish(&mut self, value: T) {
        if let Some(sender) = &self.sender {
            self.last = value.clone();
            sender.send_replace(value);
        }
    }

    pub fn get(&self) -> &T {
        &self.last
    }

    /// Receiver primed with the current value.
    ///
    /// After completion the receiver still reads the final value but
    /// `changed()` fails immediately.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => watch::channel(self.last.clone()).1,
        }
    }

    pub fn complete(&mut self) {
        self.sender.take();
    }

    pub fn is_completed(&self) -> bool {
        self.sender.is_none()
    }
}

/// Fire-and-forget channel backed by `tokio::sync::broadcast`.
#[derive(Debug)]
pub struct EventChannel<T> {
    sender: Option<broadcast::Sender<T>>,
}

impl<T: Clone> EventChannel<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Some(sender),
        }
    }

    /// Deliver `value` to current subscribers; returns how many there were.
    pub fn emit(&self, value: T) -> usize {
        self.sender
            .as_ref()
            .and_then(|sender| sender.send(value).ok())
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn complete(&mut self) {
        self.sender.take();
    }

    pub fn is_completed(&self) -> bool {
        self.sender.is_none()
    }
}
