//! Browser side of the engine's outbound seams: the real-time channel, the stored
//! credential and the session-expired notification.

use js_sys::{Function, Object, Reflect};
use pixel_engine::{ClientMessage, CredentialProvider, Transport};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomEvent, Element, Storage};

/// localStorage key of the access token.
pub const TOKEN_KEY: &str = "token";
/// localStorage key of the refresh token. Only ever removed here.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Window event fired once when the session cannot be refreshed.
pub const SESSION_EXPIRED_EVENT: &str = "socket:refresh_failed";

/// Targets inside these elements are UI chrome, not canvas.
const CHROME_SELECTOR: &str = "button, [role=\"button\"], .ui-element";

/// Callbacks object passed to `canvas_init`:
/// `{ connect(token), disconnect(), send(json), refreshToken() }`.
#[derive(Clone)]
pub struct HostCallbacks {
    object: Object,
}

impl HostCallbacks {
    pub fn new(value: JsValue) -> Result<Self, JsValue> {
        let object = value
            .dyn_into::<Object>()
            .map_err(|_| JsValue::from_str("host callbacks must be an object"))?;
        Ok(Self { object })
    }

    fn call(&self, name: &str, arg: Option<&JsValue>) {
        let func = Reflect::get(&self.object, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok());
        let Some(func) = func else {
            log::error!("host callback `{}` is missing", name);
            return;
        };
        let result = match arg {
            Some(arg) => func.call1(&self.object, arg),
            None => func.call0(&self.object),
        };
        if let Err(err) = result {
            log::error!("host callback `{}` threw: {:?}", name, err);
        }
    }
}

/// Channel transport backed by the host's socket.
pub struct JsTransport {
    host: HostCallbacks,
}

impl JsTransport {
    pub fn new(host: HostCallbacks) -> Self {
        Self { host }
    }
}

impl Transport for JsTransport {
    fn connect(&mut self, token: &str) {
        self.host.call("connect", Some(&JsValue::from_str(token)));
    }

    fn disconnect(&mut self) {
        self.host.call("disconnect", None);
    }

    fn send(&mut self, message: &ClientMessage) {
        match serde_json::to_string(message) {
            Ok(json) => self.host.call("send", Some(&JsValue::from_str(&json))),
            Err(err) => log::error!("failed to encode {:?}: {}", message, err),
        }
    }
}

/// Tokens in localStorage. Refreshing is delegated to the host, which reports back
/// through `canvas_refresh_complete`.
pub struct BrowserCredentials {
    host: HostCallbacks,
}

impl BrowserCredentials {
    pub fn new(host: HostCallbacks) -> Self {
        Self { host }
    }
}

fn local_storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

impl CredentialProvider for BrowserCredentials {
    fn access_token(&self) -> Option<String> {
        local_storage()?
            .get_item(TOKEN_KEY)
            .ok()
            .flatten()
            .filter(|t| !t.is_empty())
    }

    fn begin_refresh(&mut self) {
        self.host.call("refreshToken", None);
    }

    fn clear(&mut self) {
        let Some(storage) = local_storage() else {
            return;
        };
        for key in [TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(err) = storage.remove_item(key) {
                log::warn!("failed to remove {}: {:?}", key, err);
            }
        }
    }
}

/// Notify the page that the session is over.
pub fn dispatch_session_expired() {
    let Some(window) = web_sys::window() else {
        return;
    };
    match CustomEvent::new(SESSION_EXPIRED_EVENT) {
        Ok(event) => {
            if let Err(err) = window.dispatch_event(&event) {
                log::error!("failed to dispatch {}: {:?}", SESSION_EXPIRED_EVENT, err);
            }
        }
        Err(err) => log::error!("failed to create {}: {:?}", SESSION_EXPIRED_EVENT, err),
    }
}

/// Whether an event target sits inside a UI control.
pub fn is_chrome(target: &JsValue) -> bool {
    target
        .dyn_ref::<Element>()
        .and_then(|el| el.closest(CHROME_SELECTOR).ok().flatten())
        .is_some()
}
