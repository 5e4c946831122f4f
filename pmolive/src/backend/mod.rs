//! Playback backends.
//!
//! A backend instance lives for exactly one session: the controller asks the
//! [`BackendFactory`] for a fresh one on every load and stops it on teardown.
//! Backends report back only through the [`BackendNotifier`] they were
//! started with.

pub mod adaptive;
pub mod iframe;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Sender;
use tracing::trace;
use url::Url;

use crate::errors::ErrorEvent;
use crate::events::PlaybackSignal;
use crate::model::{SessionToken, StreamKind};

pub use adaptive::{
    AdaptiveBackend, AdaptiveEngine, EngineError, EngineErrorCategory, EngineListener,
    EngineProvider, MediaErrorCode, MediaListener, MediaSurface, NoEngine, PlayRefusal,
    SharedMediaSurface,
};
pub use iframe::{FrameListener, FrameSurface, IframeBackend, SharedFrameSurface};

/// Posts signals for one session onto the controller's queue.
///
/// All clones share one arming flag: once [`BackendNotifier::disarm`] has been
/// called no clone posts anything, which is how a stopped backend is kept
/// from reaching the controller at all. The controller still checks tokens
/// for signals already in flight.
#[derive(Clone)]
pub struct BackendNotifier {
    token: SessionToken,
    sink: Sender<PlaybackSignal>,
    armed: Arc<AtomicBool>,
}

impl fmt::Debug for BackendNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendNotifier")
            .field("token", &self.token)
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl BackendNotifier {
    pub fn new(token: SessionToken, sink: Sender<PlaybackSignal>) -> Self {
        Self {
            token,
            sink,
            armed: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn ready(&self) {
        self.post(PlaybackSignal::Ready(self.token));
    }

    pub fn error(&self, event: ErrorEvent) {
        self.post(PlaybackSignal::Error(self.token, event));
    }

    pub(crate) fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    fn post(&self, signal: PlaybackSignal) {
        if !self.is_armed() {
            trace!(token = %self.token, "Dropping signal from a stopped backend");
            return;
        }
        // the controller may already be gone
        let _ = self.sink.send(signal);
    }
}

pub trait PlaybackBackend: fmt::Debug {
    fn kind(&self) -> StreamKind;

    /// Begins loading `url`. Completion, failure and progress are reported
    /// through `notifier`; an `Err` means the backend could not even begin.
    fn start(&mut self, url: &Url, notifier: BackendNotifier) -> Result<(), ErrorEvent>;

    /// Releases every resource held for the session. Safe to call more than
    /// once and before (or without) `start`.
    fn stop(&mut self);

    /// True between a successful `start` and the next `stop`.
    fn is_attached(&self) -> bool;

    /// Called once the controller has accepted the ready signal. An `Err`
    /// is reported like any other backend error.
    fn begin_playback(&mut self) -> Result<(), ErrorEvent> {
        Ok(())
    }
}

/// The backend owned by the live session.
#[derive(Debug)]
pub enum ActiveBackend {
    Iframe(IframeBackend),
    Adaptive(AdaptiveBackend),
}

impl PlaybackBackend for ActiveBackend {
    fn kind(&self) -> StreamKind {
        match self {
            ActiveBackend::Iframe(b) => b.kind(),
            ActiveBackend::Adaptive(b) => b.kind(),
        }
    }

    fn start(&mut self, url: &Url, notifier: BackendNotifier) -> Result<(), ErrorEvent> {
        match self {
            ActiveBackend::Iframe(b) => b.start(url, notifier),
            ActiveBackend::Adaptive(b) => b.start(url, notifier),
        }
    }

    fn stop(&mut self) {
        match self {
            ActiveBackend::Iframe(b) => b.stop(),
            ActiveBackend::Adaptive(b) => b.stop(),
        }
    }

    fn is_attached(&self) -> bool {
        match self {
            ActiveBackend::Iframe(b) => b.is_attached(),
            ActiveBackend::Adaptive(b) => b.is_attached(),
        }
    }

    fn begin_playback(&mut self) -> Result<(), ErrorEvent> {
        match self {
            ActiveBackend::Iframe(b) => b.begin_playback(),
            ActiveBackend::Adaptive(b) => b.begin_playback(),
        }
    }
}

/// Builds a fresh backend per session over the shared presentation surfaces.
#[derive(Clone)]
pub struct BackendFactory {
    frame: SharedFrameSurface,
    media: SharedMediaSurface,
    engine: Arc<dyn EngineProvider>,
    native_mime_type: String,
}

impl fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFactory")
            .field("engine_supported", &self.engine.is_supported())
            .field("native_mime_type", &self.native_mime_type)
            .finish()
    }
}

impl BackendFactory {
    pub fn new(
        frame: SharedFrameSurface,
        media: SharedMediaSurface,
        engine: Arc<dyn EngineProvider>,
        native_mime_type: impl Into<String>,
    ) -> Self {
        Self {
            frame,
            media,
            engine,
            native_mime_type: native_mime_type.into(),
        }
    }

    pub fn create(&self, kind: StreamKind) -> ActiveBackend {
        match kind {
            StreamKind::Iframe => ActiveBackend::Iframe(IframeBackend::new(Arc::clone(&self.frame))),
            StreamKind::Adaptive => ActiveBackend::Adaptive(AdaptiveBackend::new(
                Arc::clone(&self.media),
                Arc::clone(&self.engine),
                self.native_mime_type.clone(),
            )),
        }
    }
}
