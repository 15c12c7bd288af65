//! Session protocol between the viewer and the rendering server.
//!
//! The transport itself is external: anything that can invoke a named remote
//! method with JSON arguments and resolve to a string implements
//! `SessionChannel`. Scene metadata comes back as JSON text, geometry parts as
//! base64 text.

use futures::future::LocalBoxFuture;
use serde_json::{Value, json};
use thiserror::Error;

pub const METHOD_SCENE_METADATA: &str = "getSceneMetaData";
pub const METHOD_WEBGL_DATA: &str = "getWebGLData";
pub const METHOD_UPDATE_CAMERA: &str = "updateCamera";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("session unavailable: {0}")]
    Unavailable(String),
    #[error("{method} failed: {message}")]
    Remote { method: String, message: String },
    #[error("unexpected response to {method}: {detail}")]
    InvalidResponse { method: String, detail: String },
}

pub type CallFuture = LocalBoxFuture<'static, Result<String, TransportError>>;

pub trait SessionChannel {
    fn call(&self, method: &str, args: Vec<Value>) -> CallFuture;

    fn get_scene_metadata(&self, view_id: &str) -> CallFuture {
        self.call(METHOD_SCENE_METADATA, vec![json!(view_id)])
    }

    /// Base64 payload of one object part; parts are numbered from 0.
    fn get_webgl_data(&self, view_id: &str, object_id: &str, part: u32) -> CallFuture {
        self.call(
            METHOD_WEBGL_DATA,
            vec![json!(view_id), json!(object_id), json!(part)],
        )
    }

    fn update_camera(
        &self,
        view_id: &str,
        focal_point: [f64; 3],
        view_up: [f64; 3],
        eye: [f64; 3],
    ) -> CallFuture {
        self.call(
            METHOD_UPDATE_CAMERA,
            vec![json!(view_id), json!(focal_point), json!(view_up), json!(eye)],
        )
    }
}
