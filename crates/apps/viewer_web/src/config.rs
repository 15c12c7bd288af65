use gpu::RenderConfig;
use scene::InteractionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid viewer config: {0}")]
    Json(String),
}

/// Viewer settings handed over by the host as JSON. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Remote view the session methods address.
    pub view_id: String,

    /// Minimum interval between scene metadata polls (ms).
    pub poll_interval_ms: f64,

    /// Decode + upload operations per tick.
    pub decode_budget_per_tick: u32,

    /// Fetched payloads allowed to wait for decoding (backpressure).
    pub max_pending_decodes: usize,

    pub rotation_factor: f32,
    pub pan_factor: f32,
    pub zoom_factor: f32,
    pub min_scale: f32,

    /// Point sprite size in pixels.
    pub point_size: f32,
    pub near: f32,
    pub far: f32,

    /// Push the interacted camera back to the server when a drag ends.
    pub push_camera: bool,
    pub camera_push_interval_ms: f64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let interaction = InteractionConfig::default();
        let render = RenderConfig::default();
        Self {
            view_id: String::new(),
            poll_interval_ms: 500.0,
            decode_budget_per_tick: 4,
            max_pending_decodes: 256,
            rotation_factor: interaction.rotation_factor,
            pan_factor: interaction.pan_factor,
            zoom_factor: interaction.zoom_factor,
            min_scale: interaction.min_scale,
            point_size: render.point_size,
            near: render.near,
            far: render.far,
            push_camera: false,
            camera_push_interval_ms: 250.0,
        }
    }
}

impl ViewerConfig {
    /// Empty or blank text yields the defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn interaction(&self) -> InteractionConfig {
        InteractionConfig {
            rotation_factor: self.rotation_factor,
            pan_factor: self.pan_factor,
            zoom_factor: self.zoom_factor,
            min_scale: self.min_scale,
        }
    }

    pub fn render(&self) -> RenderConfig {
        RenderConfig {
            near: self.near,
            far: self.far,
            point_size: self.point_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config = ViewerConfig::from_json(r#"{"viewId":"3","pollIntervalMs":100}"#).expect("parse");
        assert_eq!(config.view_id, "3");
        assert_eq!(config.poll_interval_ms, 100.0);
        assert_eq!(config.decode_budget_per_tick, ViewerConfig::default().decode_budget_per_tick);
        assert_eq!(config.interaction(), InteractionConfig::default());
    }

    #[test]
    fn blank_text_is_default() {
        assert_eq!(ViewerConfig::from_json("  ").expect("blank"), ViewerConfig::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(ViewerConfig::from_json("{"), Err(ConfigError::Json(_))));
    }
}
