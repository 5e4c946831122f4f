//! Presentation surface contract.
//!
//! The controller only pushes into the view; it never reads view state back.

use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::ErrorEvent;
use crate::model::{OriginId, StreamKind};

pub trait ViewPort {
    /// Hides whatever was shown before and displays the loading indicator.
    fn show_loading(&mut self);

    /// Hides the loading indicator and reveals the player for `kind`.
    fn show_player(&mut self, kind: StreamKind);

    /// Shows the default placeholder. `message` carries the error detail or
    /// the idle prompt.
    fn show_placeholder(&mut self, message: &str);

    /// Highlights the control that started the current session, or clears
    /// every highlight with `None`.
    fn mark_active_origin(&mut self, origin: Option<&OriginId>);

    /// Non-fatal backend trouble; playback continues.
    fn report_diagnostic(&mut self, _event: &ErrorEvent) {}
}

/// One call received by a [`RecordingViewPort`].
#[derive(Clone, Debug, PartialEq)]
pub enum ViewCall {
    Loading,
    Player(StreamKind),
    Placeholder(String),
    ActiveOrigin(Option<OriginId>),
    Diagnostic(ErrorEvent),
}

/// ViewPort that stores every call it receives.
///
/// Clones share the same log, which lets a test hand one clone to the
/// controller and inspect the other.
#[derive(Clone, Debug, Default)]
pub struct RecordingViewPort {
    calls: Arc<Mutex<Vec<ViewCall>>>,
}

impl RecordingViewPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.lock().clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take(&self) -> Vec<ViewCall> {
        std::mem::take(&mut *self.lock())
    }

    pub fn last(&self) -> Option<ViewCall> {
        self.lock().last().cloned()
    }

    /// Origin currently highlighted according to the recorded calls.
    pub fn active_origin(&self) -> Option<OriginId> {
        self.lock().iter().rev().find_map(|call| match call {
            ViewCall::ActiveOrigin(origin) => Some(origin.clone()),
            _ => None,
        })?
    }

    fn push(&self, call: ViewCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ViewCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ViewPort for RecordingViewPort {
    fn show_loading(&mut self) {
        self.push(ViewCall::Loading);
    }

    fn show_player(&mut self, kind: StreamKind) {
        self.push(ViewCall::Player(kind));
    }

    fn show_placeholder(&mut self, message: &str) {
        self.push(ViewCall::Placeholder(message.to_string()));
    }

    fn mark_active_origin(&mut self, origin: Option<&OriginId>) {
        self.push(ViewCall::ActiveOrigin(origin.cloned()));
    }

    fn report_diagnostic(&mut self, event: &ErrorEvent) {
        self.push(ViewCall::Diagnostic(event.clone()));
    }
}
