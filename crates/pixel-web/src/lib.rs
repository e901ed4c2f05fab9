pub mod host;
pub mod runner;

use std::cell::RefCell;

use pixel_engine::CanvasConfig;
use wasm_bindgen::prelude::*;

pub use host::{BrowserCredentials, HostCallbacks, JsTransport};
pub use runner::{CanvasRunner, FRAME_BITMAP_CHANGED, FRAME_READY};

thread_local! {
    static RUNNER: RefCell<Option<CanvasRunner>> = RefCell::new(None);
}

/// Run `f` against the runner. Logs and returns None if `canvas_init` has not run, or if
/// a host callback re-entered the engine synchronously.
fn with_runner<R>(f: impl FnOnce(&mut CanvasRunner) -> R) -> Option<R> {
    RUNNER.with(|cell| {
        let Ok(mut borrow) = cell.try_borrow_mut() else {
            log::error!("canvas re-entered from a host callback; deliver events asynchronously");
            return None;
        };
        match borrow.as_mut() {
            Some(runner) => Some(f(runner)),
            None => {
                log::error!("canvas not initialized. Call canvas_init() first.");
                None
            }
        }
    })
}

/// Create the engine. `host` is `{ connect(token), disconnect(), send(json), refreshToken() }`.
#[wasm_bindgen]
pub fn canvas_init(config_json: &str, width: f32, height: f32, host: JsValue) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let config = if config_json.trim().is_empty() {
        CanvasConfig::default()
    } else {
        CanvasConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    let host = HostCallbacks::new(host)?;
    let runner = CanvasRunner::new(config, width, height, host).map_err(|e| JsValue::from_str(&e.to_string()))?;

    RUNNER.with(|cell| {
        *cell.borrow_mut() = Some(runner);
    });
    log::info!("pixel canvas: initialized");
    Ok(())
}

#[wasm_bindgen]
pub fn canvas_set_local_user(user_id: &str) {
    with_runner(|r| r.set_local_user(user_id));
}

#[wasm_bindgen]
pub fn canvas_connect() -> bool {
    with_runner(|r| r.connect()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_shutdown() {
    with_runner(|r| r.shutdown());
}

// ---- Viewport ----

#[wasm_bindgen]
pub fn canvas_resize(width: f32, height: f32) -> bool {
    with_runner(|r| r.resize(width, height)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_center() -> bool {
    with_runner(|r| r.center()).unwrap_or(false)
}

// ---- Input ----
// `target` is the DOM event target; events on UI controls are not canvas gestures.

#[wasm_bindgen]
pub fn canvas_pointer_down(x: f32, y: f32, button: u8, target: JsValue) -> bool {
    let chrome = host::is_chrome(&target);
    with_runner(|r| r.pointer_down(x, y, button, chrome)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_pointer_move(x: f32, y: f32) -> bool {
    with_runner(|r| r.pointer_move(x, y)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_pointer_up(x: f32, y: f32, target: JsValue) -> bool {
    let chrome = host::is_chrome(&target);
    with_runner(|r| r.pointer_up(x, y, chrome)).unwrap_or(false)
}

/// `points` is `[x0, y0, x1, y1, ...]` for all active touches.
#[wasm_bindgen]
pub fn canvas_touch_start(points: &[f32], target: JsValue) -> bool {
    let chrome = host::is_chrome(&target);
    with_runner(|r| r.touch_start(points, chrome)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_touch_move(points: &[f32]) -> bool {
    with_runner(|r| r.touch_move(points)).unwrap_or(false)
}

/// `points` holds the touches still on the surface.
#[wasm_bindgen]
pub fn canvas_touch_end(points: &[f32], target: JsValue) -> bool {
    let chrome = host::is_chrome(&target);
    with_runner(|r| r.touch_end(points, chrome)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_wheel(x: f32, y: f32, delta_y: f32, target: JsValue) -> bool {
    let chrome = host::is_chrome(&target);
    with_runner(|r| r.wheel(x, y, delta_y, chrome)).unwrap_or(false)
}

// ---- Edit session ----

#[wasm_bindgen]
pub fn canvas_open_palette() {
    with_runner(|r| r.open_palette());
}

#[wasm_bindgen]
pub fn canvas_close_palette() -> bool {
    with_runner(|r| r.close_palette()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_set_eraser(enabled: bool) {
    with_runner(|r| r.set_eraser(enabled));
}

#[wasm_bindgen]
pub fn canvas_select_color(hex: &str) -> bool {
    with_runner(|r| r.select_color(hex)).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_undo() -> bool {
    with_runner(|r| r.undo()).unwrap_or(false)
}

#[wasm_bindgen]
pub fn canvas_clear() -> bool {
    with_runner(|r| r.clear()).unwrap_or(false)
}

/// Returns the batch's request id, or 0 if nothing was sent.
#[wasm_bindgen]
pub fn canvas_submit() -> f64 {
    with_runner(|r| r.submit()).unwrap_or(0.0)
}

// ---- Sync ----

/// Deliver one `{ type, data }` envelope from the socket.
#[wasm_bindgen]
pub fn canvas_server_message(json: &str) -> bool {
    with_runner(|r| r.server_message(json)).unwrap_or(false)
}

/// Completion of `host.refreshToken()`: the new token, or null on failure.
#[wasm_bindgen]
pub fn canvas_refresh_complete(token: Option<String>) -> bool {
    with_runner(|r| r.refresh_complete(token)).unwrap_or(false)
}

// ---- Frame ----

#[wasm_bindgen]
pub fn canvas_tick(dt: f32) -> bool {
    with_runner(|r| r.tick(dt)).unwrap_or(false)
}

/// Call from `requestAnimationFrame`. Returns `FRAME_READY | FRAME_BITMAP_CHANGED` bits.
#[wasm_bindgen]
pub fn canvas_frame() -> u32 {
    with_runner(|r| r.frame()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn canvas_drain_events() -> String {
    with_runner(|r| r.drain_events_json()).unwrap_or_else(|| "[]".to_string())
}

#[wasm_bindgen]
pub fn canvas_energy() -> String {
    with_runner(|r| r.energy_json()).unwrap_or_else(|| "null".to_string())
}

#[wasm_bindgen]
pub fn canvas_revision() -> String {
    with_runner(|r| r.revision_json()).unwrap_or_else(|| "null".to_string())
}

#[wasm_bindgen]
pub fn canvas_is_submitting() -> bool {
    with_runner(|r| r.is_submitting()).unwrap_or(false)
}

// ---- Data accessors ----

#[wasm_bindgen]
pub fn get_bitmap_ptr() -> *const u8 {
    with_runner(|r| r.bitmap_ptr()).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_bitmap_len() -> u32 {
    with_runner(|r| r.bitmap_len()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn get_bitmap_width() -> u32 {
    with_runner(|r| r.bitmap_width()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn get_bitmap_height() -> u32 {
    with_runner(|r| r.bitmap_height()).unwrap_or(0)
}

/// 8 floats, see `pixel_engine::Blit`.
#[wasm_bindgen]
pub fn get_blit_ptr() -> *const f32 {
    with_runner(|r| r.blit_ptr()).unwrap_or(std::ptr::null())
}

/// Staged cells as `[x, y]` u32 pairs.
#[wasm_bindgen]
pub fn get_staged_ptr() -> *const u32 {
    with_runner(|r| r.staged_ptr()).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_staged_count() -> u32 {
    with_runner(|r| r.staged_count()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn get_cell_screen_size() -> f32 {
    with_runner(|r| r.cell_screen_size()).unwrap_or(0.0)
}

#[wasm_bindgen]
pub fn get_scale() -> f32 {
    with_runner(|r| r.scale()).unwrap_or(1.0)
}
