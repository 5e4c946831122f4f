//! Playlist-driven adaptive playback.
//!
//! On every start the backend picks one path, in this order:
//! 1. a full adaptive engine, when the [`EngineProvider`] reports one,
//! 2. native playlist support of the [`MediaSurface`],
//! 3. nothing: the start fails with `Unsupported`.
//!
//! Engine instances are created per start and destroyed on stop; no engine is
//! ever shared between two sessions.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::backend::{BackendNotifier, PlaybackBackend};
use crate::errors::{ErrorEvent, ErrorKind};
use crate::model::StreamKind;

/// Engine detail codes meaning the playlist itself could not be obtained.
pub const PLAYLIST_FETCH_FAILURES: [&str; 3] = [
    "manifestLoadError",
    "manifestLoadTimeOut",
    "manifestParsingError",
];

pub type SharedMediaSurface = Arc<Mutex<dyn MediaSurface>>;

/// Why a media element did not start playing.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlayRefusal {
    /// The platform refused to start without a user gesture. The element
    /// stays ready; the user can start it by hand.
    #[error("autoplay prevented by the platform")]
    AutoplayBlocked,
    #[error("{0}")]
    Failed(String),
}

/// Error category as reported by the adaptive engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineErrorCategory {
    Network,
    Media,
    Mux,
    Other,
    Unknown(String),
}

/// Raw engine error, before normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError {
    pub category: EngineErrorCategory,
    pub details: String,
    pub fatal: bool,
}

impl EngineError {
    pub fn new(category: EngineErrorCategory, details: impl Into<String>, fatal: bool) -> Self {
        Self {
            category,
            details: details.into(),
            fatal,
        }
    }

    pub fn is_playlist_fetch_failure(&self) -> bool {
        PLAYLIST_FETCH_FAILURES.contains(&self.details.as_str())
    }

    /// Maps the engine payload onto the uniform taxonomy.
    ///
    /// Playlist fetch failures are fatal whatever the engine says: nothing can
    /// play without a playlist.
    pub fn to_error_event(&self) -> ErrorEvent {
        let details = &self.details;
        let (kind, detail) = match &self.category {
            EngineErrorCategory::Network => (
                ErrorKind::NetworkError,
                format!(
                    "Network error: Could not load stream segment. Check connection or stream status. Details: {details}"
                ),
            ),
            EngineErrorCategory::Media => (
                ErrorKind::MediaError,
                format!(
                    "Media error: Problem decoding stream content. The stream might be corrupt or incompatible. Details: {details}"
                ),
            ),
            EngineErrorCategory::Mux => (
                ErrorKind::ContainerError,
                format!("Mux error: Problem parsing the stream container. Details: {details}"),
            ),
            EngineErrorCategory::Other => (
                ErrorKind::OtherError,
                format!("An unexpected error occurred. Details: {details}"),
            ),
            EngineErrorCategory::Unknown(category) => (
                ErrorKind::OtherError,
                format!("An unexpected stream error occurred ({category}). Details: {details}"),
            ),
        };
        ErrorEvent {
            kind,
            detail,
            fatal: self.fatal || self.is_playlist_fetch_failure(),
        }
    }
}

/// Error codes of a media element playing natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Unknown(u16),
}

impl MediaErrorCode {
    /// Decodes the numeric code used by HTML media elements.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MediaErrorCode::Aborted,
            2 => MediaErrorCode::Network,
            3 => MediaErrorCode::Decode,
            4 => MediaErrorCode::SrcNotSupported,
            other => MediaErrorCode::Unknown(other),
        }
    }

    /// Native playback errors are always fatal.
    pub fn to_error_event(self) -> ErrorEvent {
        match self {
            MediaErrorCode::Aborted => {
                ErrorEvent::fatal(ErrorKind::OtherError, "Video playback aborted.")
            }
            MediaErrorCode::Network => ErrorEvent::fatal(
                ErrorKind::NetworkError,
                "A network error caused video download to fail.",
            ),
            MediaErrorCode::Decode => ErrorEvent::fatal(
                ErrorKind::MediaError,
                "Video playback aborted due to a corruption problem or unsupported codec.",
            ),
            MediaErrorCode::SrcNotSupported => {
                ErrorEvent::fatal(ErrorKind::MediaError, "The video source is not supported.")
            }
            MediaErrorCode::Unknown(code) => ErrorEvent::fatal(
                ErrorKind::OtherError,
                format!("An unknown video error occurred (Code: {code})"),
            ),
        }
    }
}

/// The media element the adaptive stream is rendered into.
pub trait MediaSurface: Send {
    fn can_play_type(&self, mime_type: &str) -> bool;

    /// Native path: assigns the playlist URL directly to the element.
    fn set_source(&mut self, url: &Url, listener: MediaListener);

    /// Starts playing whatever the element currently holds.
    fn play(&mut self) -> Result<(), PlayRefusal>;

    /// Pauses, drops the source and resets the element.
    fn reset(&mut self);
}

/// An adaptive streaming engine instance, valid for one session.
pub trait AdaptiveEngine: Send {
    fn attach_media(&mut self, surface: SharedMediaSurface);
    fn load_source(&mut self, url: &Url);
    fn stop_load(&mut self);
    fn detach_media(&mut self);
    fn destroy(&mut self);
}

/// Tells whether an adaptive engine exists on this platform and builds instances.
pub trait EngineProvider: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Builds a new engine that reports through `listener`.
    fn create(&self, listener: EngineListener) -> Box<dyn AdaptiveEngine>;
}

/// Provider for platforms without an adaptive engine; only the native path is left.
#[derive(Debug, Default)]
pub struct NoEngine;

impl EngineProvider for NoEngine {
    fn is_supported(&self) -> bool {
        false
    }

    fn create(&self, _listener: EngineListener) -> Box<dyn AdaptiveEngine> {
        Box::new(NoEngine)
    }
}

impl AdaptiveEngine for NoEngine {
    fn attach_media(&mut self, _surface: SharedMediaSurface) {}
    fn load_source(&mut self, _url: &Url) {}
    fn stop_load(&mut self) {}
    fn detach_media(&mut self) {}
    fn destroy(&mut self) {}
}

/// Callbacks handed to an [`AdaptiveEngine`].
#[derive(Clone, Debug)]
pub struct EngineListener {
    notifier: BackendNotifier,
}

impl EngineListener {
    pub fn manifest_parsed(&self) {
        info!(token = %self.notifier.token(), "Manifest parsed");
        self.notifier.ready();
    }

    pub fn error(&self, error: EngineError) {
        let event = error.to_error_event();
        if event.fatal {
            warn!(token = %self.notifier.token(), category = ?error.category, details = %error.details, "Fatal engine error");
        } else {
            debug!(token = %self.notifier.token(), category = ?error.category, details = %error.details, "Recoverable engine error");
        }
        self.notifier.error(event);
    }
}

/// Callbacks handed to a [`MediaSurface`] on the native path.
#[derive(Clone, Debug)]
pub struct MediaListener {
    notifier: BackendNotifier,
}

impl MediaListener {
    pub fn metadata_loaded(&self) {
        info!(token = %self.notifier.token(), "Native playlist metadata loaded");
        self.notifier.ready();
    }

    pub fn failed(&self, code: MediaErrorCode) {
        self.notifier.error(code.to_error_event());
    }
}

enum PlaybackPath {
    Engine(Box<dyn AdaptiveEngine>),
    Native,
}

impl fmt::Debug for PlaybackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPath::Engine(_) => f.write_str("Engine"),
            PlaybackPath::Native => f.write_str("Native"),
        }
    }
}

pub struct AdaptiveBackend {
    surface: SharedMediaSurface,
    engines: Arc<dyn EngineProvider>,
    native_mime_type: String,
    path: Option<PlaybackPath>,
    notifier: Option<BackendNotifier>,
}

impl fmt::Debug for AdaptiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveBackend")
            .field("native_mime_type", &self.native_mime_type)
            .field("path", &self.path)
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl AdaptiveBackend {
    pub fn new(
        surface: SharedMediaSurface,
        engines: Arc<dyn EngineProvider>,
        native_mime_type: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            engines,
            native_mime_type: native_mime_type.into(),
            path: None,
            notifier: None,
        }
    }

    /// True when the running session goes through an engine rather than the
    /// native element.
    pub fn uses_engine(&self) -> bool {
        matches!(self.path, Some(PlaybackPath::Engine(_)))
    }

    fn surface(&self) -> std::sync::MutexGuard<'_, dyn MediaSurface + 'static> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PlaybackBackend for AdaptiveBackend {
    fn kind(&self) -> StreamKind {
        StreamKind::Adaptive
    }

    fn start(&mut self, url: &Url, notifier: BackendNotifier) -> Result<(), ErrorEvent> {
        self.stop();

        if self.engines.is_supported() {
            debug!(url = %url, token = %notifier.token(), "Adaptive engine supported, initializing");
            let mut engine = self.engines.create(EngineListener {
                notifier: notifier.clone(),
            });
            engine.attach_media(Arc::clone(&self.surface));
            engine.load_source(url);
            self.path = Some(PlaybackPath::Engine(engine));
        } else if self.surface().can_play_type(&self.native_mime_type) {
            debug!(url = %url, token = %notifier.token(), "Native playlist support detected");
            let listener = MediaListener {
                notifier: notifier.clone(),
            };
            self.surface().set_source(url, listener);
            self.path = Some(PlaybackPath::Native);
        } else {
            return Err(ErrorEvent::fatal(
                ErrorKind::Unsupported,
                "Sorry, adaptive streaming is not supported on this platform.",
            ));
        }

        self.notifier = Some(notifier);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(notifier) = self.notifier.take() {
            notifier.disarm();
        }
        let Some(path) = self.path.take() else {
            return;
        };
        if let PlaybackPath::Engine(mut engine) = path {
            engine.stop_load();
            engine.detach_media();
            engine.destroy();
            debug!("Adaptive engine destroyed");
        }
        self.surface().reset();
    }

    fn is_attached(&self) -> bool {
        self.path.is_some()
    }

    fn begin_playback(&mut self) -> Result<(), ErrorEvent> {
        let native = match &self.path {
            Some(PlaybackPath::Engine(_)) => false,
            Some(PlaybackPath::Native) => true,
            None => return Ok(()),
        };
        match self.surface().play() {
            Ok(()) => Ok(()),
            Err(PlayRefusal::AutoplayBlocked) => {
                warn!(native, "Autoplay likely prevented by the platform");
                Ok(())
            }
            Err(PlayRefusal::Failed(reason)) => {
                warn!(native, reason = %reason, "Could not start playback");
                let detail = if native {
                    "Could not start native HLS playback."
                } else {
                    "Could not start video playback."
                };
                Err(ErrorEvent::recoverable(ErrorKind::OtherError, detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlaybackSignal;
    use crate::model::SessionToken;
    use crossbeam_channel::{Receiver, unbounded};

    #[derive(Default)]
    struct StubMedia {
        native: bool,
        sources: Vec<String>,
        resets: usize,
        plays: usize,
        refusal: Option<PlayRefusal>,
        listener: Option<MediaListener>,
    }

    impl MediaSurface for StubMedia {
        fn can_play_type(&self, mime_type: &str) -> bool {
            self.native && mime_type == "application/vnd.apple.mpegurl"
        }

        fn set_source(&mut self, url: &Url, listener: MediaListener) {
            self.sources.push(url.to_string());
            self.listener = Some(listener);
        }

        fn play(&mut self) -> Result<(), PlayRefusal> {
            self.plays += 1;
            match self.refusal.clone() {
                Some(refusal) => Err(refusal),
                None => Ok(()),
            }
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    #[derive(Default)]
    struct EngineLog {
        calls: Vec<&'static str>,
        listener: Option<EngineListener>,
    }

    struct StubEngine {
        log: Arc<Mutex<EngineLog>>,
    }

    impl AdaptiveEngine for StubEngine {
        fn attach_media(&mut self, _surface: SharedMediaSurface) {
            self.log.lock().unwrap().calls.push("attach_media");
        }
        fn load_source(&mut self, _url: &Url) {
            self.log.lock().unwrap().calls.push("load_source");
        }
        fn stop_load(&mut self) {
            self.log.lock().unwrap().calls.push("stop_load");
        }
        fn detach_media(&mut self) {
            self.log.lock().unwrap().calls.push("detach_media");
        }
        fn destroy(&mut self) {
            self.log.lock().unwrap().calls.push("destroy");
        }
    }

    struct StubProvider {
        log: Arc<Mutex<EngineLog>>,
    }

    impl EngineProvider for StubProvider {
        fn is_supported(&self) -> bool {
            true
        }

        fn create(&self, listener: EngineListener) -> Box<dyn AdaptiveEngine> {
            self.log.lock().unwrap().listener = Some(listener);
            Box::new(StubEngine {
                log: Arc::clone(&self.log),
            })
        }
    }

    fn start(
        backend: &mut AdaptiveBackend,
        token: u64,
    ) -> (Result<(), ErrorEvent>, Receiver<PlaybackSignal>) {
        let (tx, rx) = unbounded();
        let url = Url::parse("https://x.test/a/live.m3u8").unwrap();
        let result = backend.start(&url, BackendNotifier::new(SessionToken(token), tx));
        (result, rx)
    }

    #[test]
    fn test_engine_path_preferred() {
        let media = Arc::new(Mutex::new(StubMedia {
            native: true,
            ..Default::default()
        }));
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut backend = AdaptiveBackend::new(
            media.clone(),
            Arc::new(StubProvider { log: log.clone() }),
            "application/vnd.apple.mpegurl",
        );

        let (result, rx) = start(&mut backend, 1);
        assert!(result.is_ok());
        assert!(backend.uses_engine());
        assert!(media.lock().unwrap().sources.is_empty());
        assert_eq!(log.lock().unwrap().calls, vec!["attach_media", "load_source"]);

        log.lock().unwrap().listener.clone().unwrap().manifest_parsed();
        assert_eq!(rx.try_recv().unwrap(), PlaybackSignal::Ready(SessionToken(1)));

        backend.stop();
        backend.stop();
        assert_eq!(
            log.lock().unwrap().calls,
            vec!["attach_media", "load_source", "stop_load", "detach_media", "destroy"]
        );
        assert_eq!(media.lock().unwrap().resets, 1);
    }

    #[test]
    fn test_native_path_when_no_engine() {
        let media = Arc::new(Mutex::new(StubMedia {
            native: true,
            ..Default::default()
        }));
        let mut backend =
            AdaptiveBackend::new(media.clone(), Arc::new(NoEngine), "application/vnd.apple.mpegurl");

        let (result, rx) = start(&mut backend, 2);
        assert!(result.is_ok());
        assert!(!backend.uses_engine());
        assert_eq!(media.lock().unwrap().sources.len(), 1);

        let listener = media.lock().unwrap().listener.clone().unwrap();
        listener.failed(MediaErrorCode::from_code(3));
        match rx.try_recv().unwrap() {
            PlaybackSignal::Error(_, event) => {
                assert_eq!(event.kind, ErrorKind::MediaError);
                assert!(event.fatal);
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_platform() {
        let media = Arc::new(Mutex::new(StubMedia::default()));
        let mut backend =
            AdaptiveBackend::new(media.clone(), Arc::new(NoEngine), "application/vnd.apple.mpegurl");

        let (result, _rx) = start(&mut backend, 3);
        let event = result.unwrap_err();
        assert_eq!(event.kind, ErrorKind::Unsupported);
        assert!(event.fatal);
        assert!(!backend.is_attached());

        // stop without a completed start touches nothing
        backend.stop();
        assert_eq!(media.lock().unwrap().resets, 0);
    }

    #[test]
    fn test_begin_playback_plays_the_surface() {
        let media = Arc::new(Mutex::new(StubMedia {
            native: true,
            ..Default::default()
        }));
        let mut backend =
            AdaptiveBackend::new(media.clone(), Arc::new(NoEngine), "application/vnd.apple.mpegurl");

        // nothing to play before a start
        assert!(backend.begin_playback().is_ok());
        assert_eq!(media.lock().unwrap().plays, 0);

        let (result, _rx) = start(&mut backend, 4);
        assert!(result.is_ok());
        assert!(backend.begin_playback().is_ok());
        assert_eq!(media.lock().unwrap().plays, 1);

        media.lock().unwrap().refusal = Some(PlayRefusal::AutoplayBlocked);
        assert!(backend.begin_playback().is_ok());

        media.lock().unwrap().refusal = Some(PlayRefusal::Failed("no decoder".into()));
        let event = backend.begin_playback().unwrap_err();
        assert_eq!(event.kind, ErrorKind::OtherError);
        assert!(!event.fatal);
        assert_eq!(event.detail, "Could not start native HLS playback.");
    }

    #[test]
    fn test_engine_play_failure_message() {
        let media = Arc::new(Mutex::new(StubMedia {
            refusal: Some(PlayRefusal::Failed("detached".into())),
            ..Default::default()
        }));
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let mut backend = AdaptiveBackend::new(
            media.clone(),
            Arc::new(StubProvider { log }),
            "application/vnd.apple.mpegurl",
        );

        let (result, _rx) = start(&mut backend, 5);
        assert!(result.is_ok());
        let event = backend.begin_playback().unwrap_err();
        assert_eq!(event.detail, "Could not start video playback.");
        assert!(!event.fatal);
    }

    #[test]
    fn test_error_taxonomy() {
        let cases = [
            (EngineErrorCategory::Network, ErrorKind::NetworkError),
            (EngineErrorCategory::Media, ErrorKind::MediaError),
            (EngineErrorCategory::Mux, ErrorKind::ContainerError),
            (EngineErrorCategory::Other, ErrorKind::OtherError),
            (EngineErrorCategory::Unknown("keySystemError".into()), ErrorKind::OtherError),
        ];
        for (category, expected) in cases {
            let event = EngineError::new(category, "fragLoadError", false).to_error_event();
            assert_eq!(event.kind, expected);
            assert!(!event.fatal);
            assert!(event.detail.contains("fragLoadError"));
        }
    }

    #[test]
    fn test_playlist_fetch_failures_escalate() {
        for details in PLAYLIST_FETCH_FAILURES {
            let event =
                EngineError::new(EngineErrorCategory::Network, details, false).to_error_event();
            assert!(event.fatal, "{details} should be fatal");
        }
        let fatal_media =
            EngineError::new(EngineErrorCategory::Media, "bufferStalledError", true).to_error_event();
        assert!(fatal_media.fatal);
    }

    #[test]
    fn test_media_error_codes() {
        assert_eq!(MediaErrorCode::from_code(1), MediaErrorCode::Aborted);
        assert_eq!(MediaErrorCode::from_code(4), MediaErrorCode::SrcNotSupported);
        assert_eq!(MediaErrorCode::from_code(9), MediaErrorCode::Unknown(9));
        assert_eq!(
            MediaErrorCode::Network.to_error_event().kind,
            ErrorKind::NetworkError
        );
        assert!(
            MediaErrorCode::Unknown(9)
                .to_error_event()
                .detail
                .contains("Code: 9")
        );
    }
}
