//! # pmolive
//!
//! Playback session controller for live channels. A source is played either
//! in an embedded provider frame or through an adaptive (playlist based)
//! backend, never both at once.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use pmolive::backend::{BackendFactory, NoEngine};
//! # use pmolive::backend::{FrameListener, FrameSurface, MediaListener, MediaSurface, PlayRefusal};
//! # use url::Url;
//! # struct Frame; impl FrameSurface for Frame { fn load(&mut self, _: &Url, _: FrameListener) {} fn blank(&mut self) {} }
//! # struct Video; impl MediaSurface for Video { fn can_play_type(&self, _: &str) -> bool { true } fn set_source(&mut self, _: &Url, _: MediaListener) {} fn play(&mut self) -> Result<(), PlayRefusal> { Ok(()) } fn reset(&mut self) {} }
//! use pmolive::{OriginId, PlaybackController, PlayerConfig, RecordingViewPort};
//!
//! let config = PlayerConfig::load()?;
//! let backends = BackendFactory::new(
//!     Arc::new(Mutex::new(Frame)),
//!     Arc::new(Mutex::new(Video)),
//!     Arc::new(NoEngine),
//!     config.native_mime_type.clone(),
//! );
//! let mut controller = PlaybackController::new(config, backends, RecordingViewPort::new())?;
//! controller.request_load("https://x.test/a/live.m3u8", Some(OriginId::new("channel-1")));
//! while controller.process_next(Duration::from_millis(500)) {}
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod backend;
pub mod classifier;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod model;
pub mod timer;
pub mod viewport;

pub use classifier::SourceClassifier;
pub use config::PlayerConfig;
pub use controller::{LoadOutcome, PlaybackController, PlaybackSession};
pub use errors::{ControllerError, ErrorEvent, ErrorKind, InvalidSource};
pub use events::{ControllerEvent, ControllerEventBus, PlaybackSignal};
pub use model::{OriginId, SessionState, SessionToken, StreamKind, StreamSource};
pub use timer::{ManualTimer, ThreadTimer, TimerHandle, TimerService};
pub use viewport::{RecordingViewPort, ViewCall, ViewPort};
