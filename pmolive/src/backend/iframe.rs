//! Embedded-frame playback.
//!
//! The frame content is opaque: the only things observable are "loaded" and
//! "failed". There is no retry, an embedding failure is always fatal.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};
use url::Url;

use crate::backend::{BackendNotifier, PlaybackBackend};
use crate::errors::{ErrorEvent, ErrorKind};
use crate::model::StreamKind;

pub type SharedFrameSurface = Arc<Mutex<dyn FrameSurface>>;

/// The presentation element hosting embedded documents.
pub trait FrameSurface: Send {
    /// Points the frame at `url`. The surface reports the outcome through `listener`.
    fn load(&mut self, url: &Url, listener: FrameListener);

    /// Drops the current document (navigates to a blank page) and hides the frame.
    fn blank(&mut self);
}

/// Load callbacks handed to a [`FrameSurface`].
#[derive(Clone, Debug)]
pub struct FrameListener {
    url: String,
    notifier: BackendNotifier,
}

impl FrameListener {
    pub fn loaded(&self) {
        info!(url = %self.url, "Embedded frame loaded");
        self.notifier.ready();
    }

    /// The surface refused the embed or aborted the load.
    pub fn failed(&self) {
        self.notifier.error(ErrorEvent::fatal(
            ErrorKind::EmbedFailure,
            format!(
                "Failed to load iframe content from {}. The source might be blocking embedding.",
                self.url
            ),
        ));
    }
}

pub struct IframeBackend {
    surface: SharedFrameSurface,
    notifier: Option<BackendNotifier>,
}

impl std::fmt::Debug for IframeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IframeBackend")
            .field("notifier", &self.notifier)
            .finish()
    }
}

impl IframeBackend {
    pub fn new(surface: SharedFrameSurface) -> Self {
        Self {
            surface,
            notifier: None,
        }
    }
}

impl PlaybackBackend for IframeBackend {
    fn kind(&self) -> StreamKind {
        StreamKind::Iframe
    }

    fn start(&mut self, url: &Url, notifier: BackendNotifier) -> Result<(), ErrorEvent> {
        self.stop();

        let listener = FrameListener {
            url: url.to_string(),
            notifier: notifier.clone(),
        };
        debug!(url = %url, token = %notifier.token(), "Attempting to load embedded frame");
        self.notifier = Some(notifier);
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .load(url, listener);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(notifier) = self.notifier.take() else {
            return;
        };
        notifier.disarm();
        self.surface
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .blank();
        debug!(token = %notifier.token(), "Embedded frame released");
    }

    fn is_attached(&self) -> bool {
        self.notifier.is_some()
    }
}
