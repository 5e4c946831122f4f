use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Uniform error taxonomy shared by both backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidSource,
    /// The embedded frame refused or aborted the load. Always fatal.
    EmbedFailure,
    /// Neither ready nor error arrived within the load bound. Always fatal.
    Timeout,
    NetworkError,
    MediaError,
    ContainerError,
    OtherError,
    /// No adaptive engine and no native playlist support. Always fatal.
    Unsupported,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSource => "invalid_source",
            ErrorKind::EmbedFailure => "embed_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::MediaError => "media_error",
            ErrorKind::ContainerError => "container_error",
            ErrorKind::OtherError => "other_error",
            ErrorKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized error produced at the backend boundary.
///
/// Engine specific payloads never travel past the backend that received
/// them; the controller only ever sees this shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub detail: String,
    pub fatal: bool,
}

impl ErrorEvent {
    pub fn fatal(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            fatal: true,
        }
    }

    pub fn recoverable(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            fatal: false,
        }
    }

    pub fn timeout(bound_secs: u64) -> Self {
        Self::fatal(
            ErrorKind::Timeout,
            format!("The stream did not start within {bound_secs} seconds."),
        )
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.fatal { "fatal" } else { "recoverable" };
        write!(f, "[{} {}] {}", severity, self.kind, self.detail)
    }
}

/// Reasons a raw source string is refused by the classifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidSource {
    #[error("No stream source given")]
    Empty,
    #[error("This channel URL is not configured yet.")]
    Placeholder(String),
    #[error("Invalid stream URL '{0}': {1}")]
    Malformed(String, url::ParseError),
    #[error("Invalid stream URL '{0}': only http:// and https:// are accepted")]
    UnsupportedScheme(String),
}

impl InvalidSource {
    pub fn to_error_event(&self) -> ErrorEvent {
        ErrorEvent::fatal(ErrorKind::InvalidSource, self.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Please enter a stream URL.")]
    EmptyEntry,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ControllerError {
    pub fn invalid_config(message: &str) -> Self {
        ControllerError::InvalidConfig(message.to_string())
    }
}
