//! JS entry points. The page owns the `ViewerHandle` and the animation loop:
//! it calls `tick` every frame, everything else only queues events for the
//! next tick.

use console_error_panic_hook::set_once;
use wasm_bindgen::prelude::*;

use crate::canvas_overlay::CanvasOverlay;
use crate::config::ViewerConfig;
use crate::js_session::JsSession;
use crate::viewer::{HostEvent, HostMouseAction, Viewer, ViewerStatus};
use crate::wgpu::{WgpuBackend, init_from_canvas_id};

fn js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    set_once();
    // `tracing` falls back to `log` records without a subscriber.
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::log_1(&JsValue::from_str("console logger already installed"));
    }
    Ok(())
}

/// `call(method, args)` performs one session call and returns its result or
/// a promise of it. When no WebGL context is available the handle is still
/// returned and its `status()` reports `WebGL not supported`.
#[wasm_bindgen(js_name = createViewer)]
pub async fn create_viewer(
    canvas_id: String,
    overlay_canvas_id: String,
    call: js_sys::Function,
    config_json: String,
) -> Result<ViewerHandle, JsValue> {
    let config = ViewerConfig::from_json(&config_json).map_err(js_err)?;
    let overlay = CanvasOverlay::from_canvas_id(&overlay_canvas_id).map_err(js_err)?;
    let session = JsSession::new(call);

    let viewer = match init_from_canvas_id(&canvas_id).await {
        Ok(backend) => Viewer::new(config, backend, overlay, session),
        Err(err) => Viewer::unsupported(config, overlay, session, err),
    };
    tracing::info!(status = ?viewer.status(), view = %viewer.config().view_id, "viewer ready");
    Ok(ViewerHandle { viewer })
}

#[wasm_bindgen]
pub struct ViewerHandle {
    viewer: Viewer<WgpuBackend, CanvasOverlay, JsSession>,
}

#[wasm_bindgen]
impl ViewerHandle {
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewer.resize(width, height);
    }

    /// Returns whether a frame was drawn.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.viewer.tick(now_ms).frame.is_some()
    }

    /// Queues a JSON host event, e.g. `{"type":"mouse","action":"down","x":3,"y":4}`.
    #[wasm_bindgen(js_name = handleEvent)]
    pub fn handle_event(&mut self, event_json: &str) -> Result<(), JsValue> {
        let event = HostEvent::from_json(event_json).map_err(js_err)?;
        self.viewer.emit(event);
        Ok(())
    }

    pub fn mouse(&mut self, action: &str, button: u8, x: f64, y: f64, delta: f64) -> Result<(), JsValue> {
        let action: HostMouseAction =
            serde_json::from_value(serde_json::Value::String(action.to_string())).map_err(js_err)?;
        self.viewer.emit(HostEvent::Mouse {
            action,
            button,
            x,
            y,
            delta,
        });
        Ok(())
    }

    #[wasm_bindgen(js_name = invalidateScene)]
    pub fn invalidate_scene(&mut self) {
        self.viewer.emit(HostEvent::InvalidateScene);
    }

    #[wasm_bindgen(js_name = setActive)]
    pub fn set_active(&mut self, active: bool) {
        self.viewer.emit(HostEvent::Active { active });
    }

    pub fn render(&mut self) {
        self.viewer.emit(HostEvent::Render);
    }

    /// `running`, or the failure message.
    pub fn status(&self) -> String {
        match self.viewer.status() {
            ViewerStatus::Running => "running".to_string(),
            ViewerStatus::Failed(message) => message.clone(),
        }
    }

    /// Status, scene revision and metrics as JSON.
    pub fn stats(&self) -> String {
        self.viewer.stats_json()
    }
}
