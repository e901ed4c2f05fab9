use glam::Vec2;
use pixel_engine::{
    Blit, CanvasConfig, CanvasEngine, Color, ConfigError, EngineEvent, InputEvent, Millis,
    PointerTarget, TouchSet,
};

use crate::host::{dispatch_session_expired, BrowserCredentials, HostCallbacks, JsTransport};

/// Bit set in `frame()`'s result when a redraw is due.
pub const FRAME_READY: u32 = 1;
/// Bit set in `frame()`'s result when the bitmap must be re-uploaded.
pub const FRAME_BITMAP_CHANGED: u32 = 2;

/// Largest integer a JS number holds exactly.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn now() -> Millis {
    js_sys::Date::now()
}

fn target(is_chrome: bool) -> PointerTarget {
    if is_chrome {
        PointerTarget::Chrome
    } else {
        PointerTarget::Canvas
    }
}

/// Request ids cross into JS as plain numbers; 0 means nothing was sent.
fn request_id_for_js(id: Option<u64>) -> f64 {
    match id {
        Some(id) if id <= MAX_SAFE_INTEGER => id as f64,
        Some(id) => {
            log::error!("request id {} does not fit a JS number", id);
            0.0
        }
        None => 0.0,
    }
}

/// Flat `[x0, y0, x1, y1, ...]` touch list. Only the first two touches matter.
fn touch_set(points: &[f32]) -> TouchSet {
    match points {
        [ax, ay, bx, by, ..] => TouchSet::two(Vec2::new(*ax, *ay), Vec2::new(*bx, *by)),
        [x, y, ..] => TouchSet::one(Vec2::new(*x, *y)),
        _ => TouchSet::none(),
    }
}

/// Wires the canvas engine to the browser.
///
/// `lib.rs` keeps one runner in a `thread_local!` and exports free functions through
/// `#[wasm_bindgen]`, because wasm-bindgen cannot export generic structs directly.
/// Methods that return `bool` report whether the host must request an animation frame.
pub struct CanvasRunner {
    engine: CanvasEngine<JsTransport, BrowserCredentials>,
    /// Blit of the last rendered frame.
    blit: Blit,
    /// Staged cells of the last rendered frame as `[x, y]` pairs, for outlining.
    staged_cells: Vec<u32>,
    cell_screen_size: f32,
    events: Vec<EngineEvent>,
}

impl CanvasRunner {
    pub fn new(config: CanvasConfig, width: f32, height: f32, host: HostCallbacks) -> Result<Self, ConfigError> {
        let engine = CanvasEngine::new(
            config,
            Vec2::new(width, height),
            JsTransport::new(host.clone()),
            BrowserCredentials::new(host),
        )?;
        Ok(Self {
            engine,
            blit: Blit::default(),
            staged_cells: Vec::new(),
            cell_screen_size: 0.0,
            events: Vec::new(),
        })
    }

    /// Move engine events into the outgoing queue. The session-expired signal also goes
    /// out as a window event.
    fn collect(&mut self) -> bool {
        for event in self.engine.drain_events() {
            if event == EngineEvent::SessionExpired {
                dispatch_session_expired();
            }
            self.events.push(event);
        }
        self.engine.take_frame_request()
    }

    pub fn set_local_user(&mut self, user_id: &str) {
        self.engine.set_local_user(user_id);
    }

    pub fn connect(&mut self) -> bool {
        let connected = self.engine.connect().is_ok();
        self.collect();
        connected
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        self.collect();
    }

    // ---- Viewport ----

    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.engine.resize(Vec2::new(width, height));
        self.collect()
    }

    pub fn center(&mut self) -> bool {
        self.engine.center();
        self.collect()
    }

    // ---- Input ----

    fn input(&mut self, event: InputEvent) -> bool {
        self.engine.handle_input(event, now());
        self.collect()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, button: u8, chrome: bool) -> bool {
        self.input(InputEvent::PointerDown { x, y, button, target: target(chrome) })
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> bool {
        self.input(InputEvent::PointerMove { x, y })
    }

    pub fn pointer_up(&mut self, x: f32, y: f32, chrome: bool) -> bool {
        self.input(InputEvent::PointerUp { x, y, target: target(chrome) })
    }

    pub fn touch_start(&mut self, points: &[f32], chrome: bool) -> bool {
        self.input(InputEvent::TouchStart { touches: touch_set(points), target: target(chrome) })
    }

    pub fn touch_move(&mut self, points: &[f32]) -> bool {
        self.input(InputEvent::TouchMove { touches: touch_set(points) })
    }

    pub fn touch_end(&mut self, points: &[f32], chrome: bool) -> bool {
        self.input(InputEvent::TouchEnd { touches: touch_set(points), target: target(chrome) })
    }

    pub fn wheel(&mut self, x: f32, y: f32, delta_y: f32, chrome: bool) -> bool {
        self.input(InputEvent::Wheel { x, y, delta_y, target: target(chrome) })
    }

    // ---- Edit session ----

    pub fn open_palette(&mut self) {
        self.engine.open_edit_session();
    }

    pub fn close_palette(&mut self) -> bool {
        self.engine.close_edit_session(now());
        self.collect()
    }

    pub fn set_eraser(&mut self, enabled: bool) {
        self.engine.set_eraser(enabled);
    }

    pub fn select_color(&mut self, hex: &str) -> bool {
        match Color::parse_hex(hex) {
            Some(color) => {
                self.engine.select_color(color);
                true
            }
            None => {
                log::warn!("ignoring invalid color {:?}", hex);
                false
            }
        }
    }

    pub fn undo(&mut self) -> bool {
        self.engine.undo_last(now());
        self.collect()
    }

    pub fn clear(&mut self) -> bool {
        self.engine.clear(now());
        self.collect()
    }

    /// Returns the request id, or 0 if nothing was sent.
    pub fn submit(&mut self) -> f64 {
        let id = request_id_for_js(self.engine.submit().ok());
        self.collect();
        id
    }

    // ---- Sync ----

    pub fn server_message(&mut self, json: &str) -> bool {
        if let Err(err) = self.engine.on_server_json(json, now()) {
            log::warn!("dropping server message: {}", err);
        }
        self.collect()
    }

    pub fn refresh_complete(&mut self, token: Option<String>) -> bool {
        self.engine.on_refresh_complete(token);
        self.collect()
    }

    // ---- Frame ----

    pub fn tick(&mut self, dt: f32) -> bool {
        self.engine.tick(dt, now());
        self.collect()
    }

    /// Run the animation frame. Returns `FRAME_*` bits.
    pub fn frame(&mut self) -> u32 {
        let Some(frame) = self.engine.animation_frame() else {
            return 0;
        };
        self.blit = frame.blit;
        self.cell_screen_size = frame.cell_screen_size;
        self.staged_cells.clear();
        self.staged_cells
            .extend(frame.staged.iter().flat_map(|p| [p.pos.x, p.pos.y]));
        if frame.bitmap_changed {
            FRAME_READY | FRAME_BITMAP_CHANGED
        } else {
            FRAME_READY
        }
    }

    pub fn drain_events_json(&mut self) -> String {
        let events = std::mem::take(&mut self.events);
        serde_json::to_string(&events).unwrap_or_else(|err| {
            log::error!("failed to encode events: {}", err);
            "[]".to_string()
        })
    }

    pub fn energy_json(&self) -> String {
        serde_json::to_string(&self.engine.energy_display(now())).unwrap_or_else(|err| {
            log::error!("failed to encode energy: {}", err);
            "null".to_string()
        })
    }

    pub fn revision_json(&self) -> String {
        serde_json::to_string(&self.engine.revision()).unwrap_or_else(|_| "null".to_string())
    }

    // ---- Pointer accessors for direct wasm memory reads ----

    pub fn bitmap_ptr(&self) -> *const u8 {
        self.engine.bitmap().bytes_ptr()
    }

    pub fn bitmap_len(&self) -> u32 {
        self.engine.bitmap().byte_len() as u32
    }

    pub fn bitmap_width(&self) -> u32 {
        self.engine.bitmap().width()
    }

    pub fn bitmap_height(&self) -> u32 {
        self.engine.bitmap().height()
    }

    pub fn blit_ptr(&self) -> *const f32 {
        &self.blit as *const Blit as *const f32
    }

    pub fn staged_ptr(&self) -> *const u32 {
        self.staged_cells.as_ptr()
    }

    pub fn staged_count(&self) -> u32 {
        (self.staged_cells.len() / 2) as u32
    }

    pub fn cell_screen_size(&self) -> f32 {
        self.cell_screen_size
    }

    pub fn scale(&self) -> f32 {
        self.engine.viewport().scale()
    }

    pub fn is_submitting(&self) -> bool {
        self.engine.is_submitting()
    }
}
