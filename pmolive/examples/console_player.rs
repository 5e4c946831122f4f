//! Channel switching on simulated surfaces.
//!
//! Run with `RUST_LOG=debug cargo run -p pmolive --example console_player`.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pmolive::backend::{
    AdaptiveEngine, BackendFactory, EngineError, EngineErrorCategory, EngineListener,
    EngineProvider, FrameListener, FrameSurface, MediaListener, MediaSurface, PlayRefusal,
    SharedMediaSurface,
};
use pmolive::{ErrorEvent, OriginId, PlaybackController, PlayerConfig, StreamKind, ViewPort};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

struct ConsoleView;

impl ViewPort for ConsoleView {
    fn show_loading(&mut self) {
        println!("[view] loading...");
    }

    fn show_player(&mut self, kind: StreamKind) {
        println!("[view] showing {kind} player");
    }

    fn show_placeholder(&mut self, message: &str) {
        println!("[view] placeholder: {message}");
    }

    fn mark_active_origin(&mut self, origin: Option<&OriginId>) {
        match origin {
            Some(origin) => println!("[view] active: {origin}"),
            None => println!("[view] no active channel"),
        }
    }

    fn report_diagnostic(&mut self, event: &ErrorEvent) {
        println!("[view] diagnostic: {event}");
    }
}

/// Frames whose host contains "blocked" refuse embedding; others load after 100ms.
struct SimFrame;

impl FrameSurface for SimFrame {
    fn load(&mut self, url: &Url, listener: FrameListener) {
        let blocked = url.host_str().is_some_and(|h| h.contains("blocked"));
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            if blocked {
                listener.failed();
            } else {
                listener.loaded();
            }
        });
    }

    fn blank(&mut self) {}
}

struct SimVideo;

impl MediaSurface for SimVideo {
    fn can_play_type(&self, _mime_type: &str) -> bool {
        false
    }

    fn set_source(&mut self, _url: &Url, _listener: MediaListener) {}

    fn play(&mut self) -> Result<(), PlayRefusal> {
        println!("[video] playing");
        Ok(())
    }

    fn reset(&mut self) {}
}

/// Parses the manifest after 150ms, then reports one recoverable network hiccup.
struct SimEngine {
    listener: EngineListener,
}

impl AdaptiveEngine for SimEngine {
    fn attach_media(&mut self, _surface: SharedMediaSurface) {}

    fn load_source(&mut self, _url: &Url) {
        let listener = self.listener.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            listener.manifest_parsed();
            thread::sleep(Duration::from_millis(150));
            listener.error(EngineError::new(
                EngineErrorCategory::Network,
                "fragLoadError",
                false,
            ));
        });
    }

    fn stop_load(&mut self) {}
    fn detach_media(&mut self) {}
    fn destroy(&mut self) {}
}

struct SimEngineProvider;

impl EngineProvider for SimEngineProvider {
    fn is_supported(&self) -> bool {
        true
    }

    fn create(&self, listener: EngineListener) -> Box<dyn AdaptiveEngine> {
        Box::new(SimEngine { listener })
    }
}

fn drain<T: pmolive::TimerService>(controller: &mut PlaybackController<ConsoleView, T>) {
    while controller.process_next(Duration::from_millis(400)) {}
    info!(state = %controller.state(), "Settled");
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = PlayerConfig::load()?;
    config.load_timeout_secs = 2;

    let backends = BackendFactory::new(
        Arc::new(Mutex::new(SimFrame)),
        Arc::new(Mutex::new(SimVideo)),
        Arc::new(SimEngineProvider),
        config.native_mime_type.clone(),
    );
    let mut controller = PlaybackController::new(config, backends, ConsoleView)?;

    controller.request_load(
        "https://provider.test/embed/news",
        Some(OriginId::new("channel-1")),
    );
    drain(&mut controller);

    // switch before the first channel resolves
    controller.request_load(
        "https://provider.test/embed/sports",
        Some(OriginId::new("channel-2")),
    );
    controller.request_load(
        "https://cdn.test/live/sports.m3u8",
        Some(OriginId::new("channel-3")),
    );
    drain(&mut controller);

    controller.request_load("https://blocked.test/embed", Some(OriginId::new("channel-4")));
    drain(&mut controller);

    controller.request_load("YOUR_CHANNEL_5_URL", Some(OriginId::new("channel-5")));
    controller.submit_manual("https://cdn.test/manual/stream")?;
    drain(&mut controller);

    controller.cancel();
    Ok(())
}
