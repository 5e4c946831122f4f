use std::fmt;

use serde::Serialize;
use url::Url;

use crate::errors::ErrorEvent;

/// Identifies the control (channel button, menu entry...) that asked for a load.
///
/// The controller never interprets it; it only hands it back to the
/// [`ViewPort`](crate::viewport::ViewPort) for highlighting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct OriginId(pub String);

impl OriginId {
    pub fn new(id: impl Into<String>) -> Self {
        OriginId(id.into())
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which playback backend a source is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    /// Provider-controlled embedded document.
    Iframe,
    /// Playlist-driven adaptive bitrate stream.
    Adaptive,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Iframe => f.write_str("iframe"),
            StreamKind::Adaptive => f.write_str("adaptive"),
        }
    }
}

/// A classified source. Only [`SourceClassifier`](crate::classifier::SourceClassifier)
/// builds these, so the URL is always an absolute http(s) URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StreamSource {
    url: Url,
    kind: StreamKind,
}

impl StreamSource {
    pub(crate) fn new(url: Url, kind: StreamKind) -> Self {
        Self { url, kind }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.kind)
    }
}

/// Opaque value identifying one session instance.
///
/// Tokens are never reused by a controller, so a signal carrying an old
/// token can always be told apart from one belonging to the live session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionToken(pub(crate) u64);

impl SessionToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum SessionState {
    Idle,
    Loading,
    Playing,
    Error(ErrorEvent),
}

impl SessionState {
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionState::Error(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Loading | SessionState::Playing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Playing => "playing",
            SessionState::Error(_) => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Error(event) => write!(f, "error: {}", event),
            other => f.write_str(other.label()),
        }
    }
}
