#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use pmolive::backend::{
    AdaptiveEngine, BackendFactory, EngineListener, EngineProvider, FrameListener, FrameSurface,
    MediaListener, MediaSurface, PlayRefusal, SharedMediaSurface,
};
use pmolive::{ManualTimer, PlaybackController, PlayerConfig, RecordingViewPort};
use url::Url;

pub const NATIVE_MIME: &str = "application/vnd.apple.mpegurl";

#[derive(Default)]
pub struct MockFrame {
    pub loads: Vec<String>,
    pub blanks: usize,
    pub current: Option<FrameListener>,
    /// Every listener ever handed out, oldest first.
    pub listeners: Vec<FrameListener>,
}

impl FrameSurface for MockFrame {
    fn load(&mut self, url: &Url, listener: FrameListener) {
        self.loads.push(url.to_string());
        self.current = Some(listener.clone());
        self.listeners.push(listener);
    }

    fn blank(&mut self) {
        self.blanks += 1;
        self.current = None;
    }
}

#[derive(Default)]
pub struct MockVideo {
    pub native: bool,
    pub sources: Vec<String>,
    pub resets: usize,
    pub plays: usize,
    /// Returned by every `play` call while set.
    pub refusal: Option<PlayRefusal>,
    pub current: Option<MediaListener>,
}

impl MediaSurface for MockVideo {
    fn can_play_type(&self, mime_type: &str) -> bool {
        self.native && mime_type == NATIVE_MIME
    }

    fn set_source(&mut self, url: &Url, listener: MediaListener) {
        self.sources.push(url.to_string());
        self.current = Some(listener);
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
        self.current = None;
    }
}

#[derive(Default)]
pub struct EngineBook {
    pub created: usize,
    pub destroyed: usize,
    pub loaded: Vec<String>,
    pub listeners: Vec<EngineListener>,
}

impl EngineBook {
    pub fn live(&self) -> usize {
        self.created - self.destroyed
    }
}

pub struct MockEngine {
    book: Arc<Mutex<EngineBook>>,
    destroyed: bool,
}

impl AdaptiveEngine for MockEngine {
    fn attach_media(&mut self, _surface: SharedMediaSurface) {}

    fn load_source(&mut self, url: &Url) {
        self.book.lock().unwrap().loaded.push(url.to_string());
    }

    fn stop_load(&mut self) {}

    fn detach_media(&mut self) {}

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.book.lock().unwrap().destroyed += 1;
        }
    }
}

pub struct MockEngineProvider {
    pub supported: bool,
    pub book: Arc<Mutex<EngineBook>>,
}

impl EngineProvider for MockEngineProvider {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, listener: EngineListener) -> Box<dyn AdaptiveEngine> {
        let mut book = self.book.lock().unwrap();
        book.created += 1;
        book.listeners.push(listener);
        Box::new(MockEngine {
            book: Arc::clone(&self.book),
            destroyed: false,
        })
    }
}

pub struct Harness {
    pub controller: PlaybackController<RecordingViewPort, ManualTimer>,
    pub view: RecordingViewPort,
    pub timer: ManualTimer,
    pub frame: Arc<Mutex<MockFrame>>,
    pub video: Arc<Mutex<MockVideo>>,
    pub engines: Arc<Mutex<EngineBook>>,
}

impl Harness {
    /// Engine supported, no native playlist support.
    pub fn new() -> Self {
        Self::with_platform(true, false)
    }

    pub fn with_platform(engine_supported: bool, native: bool) -> Self {
        let frame = Arc::new(Mutex::new(MockFrame::default()));
        let video = Arc::new(Mutex::new(MockVideo {
            native,
            ..Default::default()
        }));
        let engines = Arc::new(Mutex::new(EngineBook::default()));
        let provider = MockEngineProvider {
            supported: engine_supported,
            book: Arc::clone(&engines),
        };

        let backends = BackendFactory::new(
            frame.clone(),
            video.clone(),
            Arc::new(provider),
            NATIVE_MIME,
        );
        let view = RecordingViewPort::new();
        let timer = ManualTimer::new();
        let controller = PlaybackController::with_timer(
            PlayerConfig::default(),
            backends,
            view.clone(),
            timer.clone(),
        )
        .unwrap();

        Self {
            controller,
            view,
            timer,
            frame,
            video,
            engines,
        }
    }

    /// Backend instances currently holding a presentation resource.
    pub fn attached_backends(&self) -> usize {
        let frame = self.frame.lock().unwrap().current.is_some() as usize;
        let native = self.video.lock().unwrap().current.is_some() as usize;
        frame + native + self.engines.lock().unwrap().live()
    }

    pub fn frame_listener(&self) -> FrameListener {
        self.frame.lock().unwrap().listeners.last().cloned().unwrap()
    }

    pub fn frame_listener_at(&self, index: usize) -> FrameListener {
        self.frame.lock().unwrap().listeners[index].clone()
    }

    pub fn engine_listener(&self) -> EngineListener {
        self.engines.lock().unwrap().listeners.last().cloned().unwrap()
    }

    pub fn engine_listener_at(&self, index: usize) -> EngineListener {
        self.engines.lock().unwrap().listeners[index].clone()
    }

    pub fn media_listener(&self) -> MediaListener {
        self.video.lock().unwrap().current.clone().unwrap()
    }

    pub fn backend_starts(&self) -> usize {
        self.frame.lock().unwrap().loads.len()
            + self.video.lock().unwrap().sources.len()
            + self.engines.lock().unwrap().created
    }
}
