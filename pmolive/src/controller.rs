//! Playback session controller.
//!
//! `PlaybackController` owns the one live [`PlaybackSession`] and the backend
//! attached to it. All asynchronous input (backend ready/error, load timeout)
//! enters through [`PlaybackController::handle_signal`], which drops any
//! signal whose token is not the live session's.
//!
//! ```text
//!            request_load                 ready
//!   Idle ─────────────────▶ Loading ──────────────▶ Playing
//!     ▲                       │  fatal error/timeout    │
//!     │ cancel                ▼                         │ fatal error
//!     └──────────────────── Error ◀─────────────────────┘
//! ```
//!
//! `Playing` and `Error` go back to `Loading` on a new `request_load`; every
//! state goes to `Idle` on `cancel`.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, error, info, trace, warn};

use crate::backend::{ActiveBackend, BackendFactory, BackendNotifier, PlaybackBackend};
use crate::classifier::SourceClassifier;
use crate::config::PlayerConfig;
use crate::errors::{ControllerError, ErrorEvent, InvalidSource};
use crate::events::{ControllerEvent, ControllerEventBus, PlaybackSignal};
use crate::model::{OriginId, SessionState, SessionToken, StreamSource};
use crate::timer::{ThreadTimer, TimerHandle, TimerService};
use crate::viewport::ViewPort;

/// What `request_load` did with the request.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    /// A new session is loading.
    Started(SessionToken),
    /// The same source is already loading or playing; only the origin
    /// highlight was refreshed.
    AlreadyActive(SessionToken),
    /// The raw source was refused; the controller is in `Error`.
    Rejected(InvalidSource),
    /// The backend could not even begin; the controller is in `Error`.
    Failed(ErrorEvent),
}

/// The single live session. Replaced wholesale on every load and cancel.
#[derive(Debug)]
pub struct PlaybackSession {
    token: Option<SessionToken>,
    source: Option<StreamSource>,
    origin: Option<OriginId>,
    backend: Option<ActiveBackend>,
    timeout: Option<TimerHandle>,
    state: SessionState,
}

impl PlaybackSession {
    fn idle() -> Self {
        Self {
            token: None,
            source: None,
            origin: None,
            backend: None,
            timeout: None,
            state: SessionState::Idle,
        }
    }

    fn loading(token: SessionToken, source: StreamSource, origin: Option<OriginId>) -> Self {
        Self {
            token: Some(token),
            source: Some(source),
            origin,
            backend: None,
            timeout: None,
            state: SessionState::Loading,
        }
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.token
    }

    pub fn source(&self) -> Option<&StreamSource> {
        self.source.as_ref()
    }

    pub fn origin(&self) -> Option<&OriginId> {
        self.origin.as_ref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn has_attached_backend(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_attached())
    }

    pub fn has_pending_timeout(&self) -> bool {
        self.timeout.is_some()
    }
}

pub struct PlaybackController<V: ViewPort, T: TimerService = ThreadTimer> {
    config: PlayerConfig,
    classifier: SourceClassifier,
    backends: BackendFactory,
    timer: T,
    view: V,
    session: PlaybackSession,
    last_token: u64,
    signal_tx: Sender<PlaybackSignal>,
    signal_rx: Receiver<PlaybackSignal>,
    event_bus: ControllerEventBus,
}

impl<V: ViewPort> PlaybackController<V, ThreadTimer> {
    /// Builds a controller whose load timeouts run on real time.
    pub fn new(
        config: PlayerConfig,
        backends: BackendFactory,
        view: V,
    ) -> Result<Self, ControllerError> {
        Self::with_timer(config, backends, view, ThreadTimer::new())
    }
}

impl<V: ViewPort, T: TimerService> PlaybackController<V, T> {
    pub fn with_timer(
        config: PlayerConfig,
        backends: BackendFactory,
        view: V,
        timer: T,
    ) -> Result<Self, ControllerError> {
        config
            .validate()
            .map_err(|e| ControllerError::invalid_config(&e.to_string()))?;

        let (signal_tx, signal_rx) = unbounded();
        let mut controller = Self {
            classifier: SourceClassifier::from_config(&config),
            config,
            backends,
            timer,
            view,
            session: PlaybackSession::idle(),
            last_token: 0,
            signal_tx,
            signal_rx,
            event_bus: ControllerEventBus::new(),
        };
        controller.show_idle();
        info!("Playback controller initialized");
        Ok(controller)
    }

    pub fn state(&self) -> &SessionState {
        &self.session.state
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn subscribe(&self) -> Receiver<ControllerEvent> {
        self.event_bus.subscribe()
    }

    /// Classifies `raw` and starts a session for it.
    ///
    /// Loading the source that is already loading or playing does nothing
    /// besides re-marking `origin`.
    pub fn request_load(&mut self, raw: &str, origin: Option<OriginId>) -> LoadOutcome {
        match self.classifier.classify(raw) {
            Ok(source) => self.load_source(source, origin),
            Err(reason) => self.reject(reason),
        }
    }

    /// Loads a URL typed by the user. Such URLs are always played as
    /// playlists and mark no origin.
    pub fn submit_manual(&mut self, raw_url: &str) -> Result<LoadOutcome, ControllerError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(ControllerError::EmptyEntry);
        }
        Ok(match self.classifier.classify_manual(raw_url) {
            Ok(source) => self.load_source(source, None),
            Err(reason) => self.reject(reason),
        })
    }

    /// Tears the session down and returns to `Idle`.
    pub fn cancel(&mut self) {
        let previous = self.session.token;
        self.teardown();
        self.session = PlaybackSession::idle();
        self.show_idle();
        info!(token = ?previous, "Playback cancelled");
        self.publish_state();
    }

    /// Single entry point for asynchronous signals.
    pub fn handle_signal(&mut self, signal: PlaybackSignal) {
        trace!(token = %signal.token(), live = ?self.session.token, "Handling playback signal");
        match signal {
            PlaybackSignal::Ready(token) => self.on_backend_ready(token),
            PlaybackSignal::Error(token, event) => self.on_backend_error(token, event),
            PlaybackSignal::Timeout(token) => self.on_timeout(token),
        }
    }

    /// Handles every signal already queued, without blocking. Returns how many
    /// were processed (stale ones included).
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            self.handle_signal(signal);
            processed += 1;
        }
        processed
    }

    /// Waits up to `timeout` for one signal and handles it.
    pub fn process_next(&mut self, timeout: Duration) -> bool {
        match self.signal_rx.recv_timeout(timeout) {
            Ok(signal) => {
                self.handle_signal(signal);
                true
            }
            Err(_) => false,
        }
    }

    fn load_source(&mut self, source: StreamSource, origin: Option<OriginId>) -> LoadOutcome {
        if let Some(token) = self.session.token {
            if self.session.state.is_active() && self.session.source.as_ref() == Some(&source) {
                debug!(%token, url = %source.url(), "Stream already loaded");
                self.view.mark_active_origin(origin.as_ref());
                self.session.origin = origin;
                return LoadOutcome::AlreadyActive(token);
            }
        }

        self.teardown();

        self.last_token += 1;
        let token = SessionToken(self.last_token);
        let kind = source.kind();
        let url = source.url().clone();
        info!(%token, url = %url, %kind, origin = ?origin, "Starting playback session");

        self.session = PlaybackSession::loading(token, source.clone(), origin);
        self.view.show_loading();
        self.view.mark_active_origin(self.session.origin.as_ref());
        self.event_bus
            .broadcast(ControllerEvent::SessionStarted { token, source });
        self.publish_state();

        self.session.timeout = Some(self.timer.schedule(
            self.config.load_timeout(),
            token,
            self.signal_tx.clone(),
        ));

        let mut backend = self.backends.create(kind);
        let started = backend.start(&url, BackendNotifier::new(token, self.signal_tx.clone()));
        self.session.backend = Some(backend);

        match started {
            Ok(()) => LoadOutcome::Started(token),
            Err(event) => {
                self.on_backend_error(token, event.clone());
                LoadOutcome::Failed(event)
            }
        }
    }

    fn reject(&mut self, reason: InvalidSource) -> LoadOutcome {
        warn!(reason = %reason, "Rejected stream source");
        self.teardown();
        let event = reason.to_error_event();
        self.session = PlaybackSession::idle();
        self.session.state = SessionState::Error(event.clone());
        self.view.show_placeholder(&event.detail);
        self.view.mark_active_origin(None);
        self.publish_state();
        LoadOutcome::Rejected(reason)
    }

    /// True when `token` belongs to the live session and that session is
    /// still waiting for or playing its stream.
    fn is_live(&self, token: SessionToken) -> bool {
        self.session.token == Some(token) && self.session.state.is_active()
    }

    fn on_backend_ready(&mut self, token: SessionToken) {
        if !self.is_live(token) || self.session.state != SessionState::Loading {
            debug!(%token, "Ignoring stale ready signal");
            return;
        }
        self.cancel_timeout();
        self.session.state = SessionState::Playing;

        if let Some(source) = &self.session.source {
            info!(%token, url = %source.url(), "Playback started");
            self.view.show_player(source.kind());
        }
        self.publish_state();

        let started = match self.session.backend.as_mut() {
            Some(backend) => backend.begin_playback(),
            None => Ok(()),
        };
        if let Err(event) = started {
            self.on_backend_error(token, event);
        }
    }

    fn on_timeout(&mut self, token: SessionToken) {
        if !self.is_live(token) || self.session.state != SessionState::Loading {
            debug!(%token, "Ignoring stale timeout");
            return;
        }
        self.session.timeout = None;
        let event = ErrorEvent::timeout(self.config.load_timeout_secs);
        self.on_backend_error(token, event);
    }

    fn on_backend_error(&mut self, token: SessionToken, event: ErrorEvent) {
        if !self.is_live(token) {
            debug!(%token, error = %event, "Ignoring error from a superseded session");
            return;
        }

        if !event.fatal {
            warn!(%token, kind = %event.kind, detail = %event.detail, "Recoverable playback error");
            self.view.report_diagnostic(&event);
            self.event_bus
                .broadcast(ControllerEvent::Diagnostic { token, event });
            return;
        }

        error!(%token, kind = %event.kind, detail = %event.detail, "Fatal playback error");
        self.teardown();
        self.session.origin = None;
        self.session.state = SessionState::Error(event.clone());
        self.view.show_placeholder(&event.detail);
        self.view.mark_active_origin(None);
        self.publish_state();
    }

    fn cancel_timeout(&mut self) {
        if let Some(handle) = self.session.timeout.take() {
            handle.cancel();
        }
    }

    /// Stops the timer and the backend of the current session.
    fn teardown(&mut self) {
        self.cancel_timeout();
        if let Some(mut backend) = self.session.backend.take() {
            backend.stop();
            debug!(token = ?self.session.token, kind = %backend.kind(), "Backend torn down");
        }
    }

    fn show_idle(&mut self) {
        self.view.show_placeholder(&self.config.placeholder_message);
        self.view.mark_active_origin(None);
    }

    fn publish_state(&self) {
        self.event_bus.broadcast(ControllerEvent::StateChanged {
            token: self.session.token,
            state: self.session.state.clone(),
        });
    }
}

impl<V: ViewPort, T: TimerService> Drop for PlaybackController<V, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
