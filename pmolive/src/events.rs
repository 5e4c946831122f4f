use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::errors::ErrorEvent;
use crate::model::{SessionState, SessionToken, StreamSource};

/// Asynchronous signal delivered to the controller's single entry point.
///
/// Every signal carries the token of the session that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackSignal {
    Ready(SessionToken),
    Error(SessionToken, ErrorEvent),
    Timeout(SessionToken),
}

impl PlaybackSignal {
    pub fn token(&self) -> SessionToken {
        match self {
            PlaybackSignal::Ready(token)
            | PlaybackSignal::Error(token, _)
            | PlaybackSignal::Timeout(token) => *token,
        }
    }
}

/// Notifications published by the controller for observers other than the ViewPort.
#[derive(Clone, Debug)]
pub enum ControllerEvent {
    SessionStarted {
        token: SessionToken,
        source: StreamSource,
    },
    StateChanged {
        token: Option<SessionToken>,
        state: SessionState,
    },
    /// Non-fatal backend error; playback goes on.
    Diagnostic {
        token: SessionToken,
        event: ErrorEvent,
    },
}

#[derive(Clone, Default)]
pub struct ControllerEventBus {
    subscribers: Arc<Mutex<Vec<Sender<ControllerEvent>>>>,
}

impl ControllerEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<ControllerEvent> {
        let (tx, rx) = unbounded::<ControllerEvent>();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn broadcast(&self, event: ControllerEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
