use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Length of a `lookAt` vector: `[fov, focal xyz, up xyz, eye xyz]`.
pub const LOOK_AT_LEN: usize = 10;

/// Layer and renderer indices must stay below this.
pub const MAX_LAYERS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("invalid scene descriptor JSON: {0}")]
    Json(String),
    #[error("invalid scene descriptor: {0}")]
    Invalid(String),
}

/// Cache identity of one object version. Parts are addressed separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub id: String,
    pub md5: String,
}

impl ObjectKey {
    pub fn new(id: impl Into<String>, md5: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            md5: md5.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.md5)
    }
}

/// Server-pushed scene snapshot, replaced wholesale on every poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SceneDescriptor {
    #[serde(default, alias = "Objects")]
    pub objects: Vec<ObjectMeta>,
    #[serde(default, alias = "Renderers")]
    pub renderers: Vec<LayerCamera>,
    #[serde(default, alias = "Center")]
    pub center: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectMeta {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub md5: String,
    #[serde(default)]
    pub layer: usize,
    #[serde(default = "one_part")]
    pub parts: u32,
    #[serde(
        default,
        rename = "hasTransparency",
        alias = "transparency",
        alias = "has_transparency",
        deserialize_with = "flag"
    )]
    pub has_transparency: bool,
}

impl ObjectMeta {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.id.clone(), self.md5.clone())
    }
}

/// Camera and viewport of one compositing layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerCamera {
    #[serde(default, alias = "layer")]
    pub index: usize,
    #[serde(rename = "lookAt", alias = "LookAt")]
    pub look_at: [f64; LOOK_AT_LEN],
    #[serde(default, rename = "background1", alias = "Background1")]
    pub background1: [f32; 3],
    #[serde(
        default,
        rename = "background2",
        alias = "Background2",
        skip_serializing_if = "Option::is_none"
    )]
    pub background2: Option<[f32; 3]>,
    #[serde(default)]
    pub origin: [f64; 2],
    #[serde(default = "full_viewport")]
    pub size: [f64; 2],
}

impl LayerCamera {
    pub fn fov_degrees(&self) -> f64 {
        self.look_at[0]
    }

    pub fn focal_point(&self) -> [f64; 3] {
        [self.look_at[1], self.look_at[2], self.look_at[3]]
    }

    pub fn view_up(&self) -> [f64; 3] {
        [self.look_at[4], self.look_at[5], self.look_at[6]]
    }

    pub fn eye(&self) -> [f64; 3] {
        [self.look_at[7], self.look_at[8], self.look_at[9]]
    }

    /// Distance from eye to focal point.
    pub fn depth(&self) -> f64 {
        let e = self.eye();
        let f = self.focal_point();
        ((e[0] - f[0]).powi(2) + (e[1] - f[1]).powi(2) + (e[2] - f[2]).powi(2)).sqrt()
    }
}

impl SceneDescriptor {
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        let descriptor: SceneDescriptor =
            serde_json::from_str(text).map_err(|e| SceneError::Json(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        serde_json::to_string(self).map_err(|e| SceneError::Json(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        for object in &self.objects {
            if object.parts == 0 {
                return Err(SceneError::Invalid(format!(
                    "object {} declares zero parts",
                    object.id
                )));
            }
            if object.layer >= MAX_LAYERS {
                return Err(SceneError::Invalid(format!(
                    "object {} is on layer {} (limit {MAX_LAYERS})",
                    object.id, object.layer
                )));
            }
        }
        for renderer in &self.renderers {
            if renderer.index >= MAX_LAYERS {
                return Err(SceneError::Invalid(format!(
                    "renderer index {} exceeds limit {MAX_LAYERS}",
                    renderer.index
                )));
            }
        }
        Ok(())
    }

    /// Camera for `layer`, looked up by its declared index.
    pub fn camera(&self, layer: usize) -> Option<&LayerCamera> {
        self.renderers.iter().find(|r| r.index == layer)
    }

    pub fn object(&self, id: &str) -> Option<&ObjectMeta> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Number of layers spanned by cameras and objects.
    pub fn layer_count(&self) -> usize {
        let span = |index: usize| index.saturating_add(1);
        let cameras = self.renderers.iter().map(|r| span(r.index)).max().unwrap_or(0);
        let objects = self.objects.iter().map(|o| span(o.layer)).max().unwrap_or(0);
        cameras.max(objects)
    }
}

fn one_part() -> u32 {
    1
}

fn full_viewport() -> [f64; 2] {
    [1.0, 1.0]
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Int(i64),
    Float(f64),
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match IdRepr::deserialize(d)? {
        IdRepr::Text(s) => s,
        IdRepr::Int(i) => i.to_string(),
        IdRepr::Float(f) => f.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Num(f64),
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match FlagRepr::deserialize(d)? {
        FlagRepr::Bool(b) => b,
        FlagRepr::Num(n) => n != 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SERVER_JSON: &str = r#"{
        "Objects": [
            {"id": 42, "md5": "aa", "parts": 2, "layer": 0, "transparency": 0},
            {"id": "7", "md5": "bb", "transparency": 1},
            {"id": 9, "md5": "cc", "layer": 1, "hasTransparency": true}
        ],
        "Renderers": [
            {"layer": 0, "LookAt": [30, 0, 0, 0, 0, 1, 0, 0, 0, 10],
             "Background1": [0.1, 0.1, 0.2], "Background2": [0.3, 0.3, 0.5]},
            {"layer": 1, "LookAt": [30, 0, 0, 0, 0, 1, 0, 0, 0, 5],
             "origin": [0.75, 0.0], "size": [0.25, 0.25]}
        ],
        "Center": [1.0, 2.0, 3.0]
    }"#;

    #[test]
    fn parses_server_descriptor() {
        let d = SceneDescriptor::from_json(SERVER_JSON).expect("parse");
        assert_eq!(d.objects.len(), 3);
        assert_eq!(d.objects[0].id, "42");
        assert_eq!(d.objects[0].parts, 2);
        assert!(!d.objects[0].has_transparency);
        assert_eq!(d.objects[1].parts, 1);
        assert_eq!(d.objects[1].layer, 0);
        assert!(d.objects[1].has_transparency);
        assert!(d.objects[2].has_transparency);
        assert_eq!(d.center, [1.0, 2.0, 3.0]);
        assert_eq!(d.layer_count(), 2);

        let world = d.camera(0).expect("layer 0");
        assert_eq!(world.fov_degrees(), 30.0);
        assert_eq!(world.eye(), [0.0, 0.0, 10.0]);
        assert_eq!(world.depth(), 10.0);
        assert_eq!(world.size, [1.0, 1.0]);
        assert_eq!(world.background2, Some([0.3, 0.3, 0.5]));

        let inset = d.camera(1).expect("layer 1");
        assert_eq!(inset.origin, [0.75, 0.0]);
        assert_eq!(inset.background2, None);
    }

    #[test]
    fn lowercase_keys_and_serialized_form_parse() {
        let d = SceneDescriptor::from_json(SERVER_JSON).expect("parse");
        let text = d.to_json().expect("serialize");
        assert_eq!(SceneDescriptor::from_json(&text).expect("reparse"), d);
    }

    #[test]
    fn zero_parts_is_invalid() {
        let err = SceneDescriptor::from_json(r#"{"objects":[{"id":"a","md5":"x","parts":0}]}"#)
            .unwrap_err();
        assert!(matches!(err, SceneError::Invalid(_)));
    }

    #[test]
    fn out_of_range_layers_are_invalid() {
        let err = SceneDescriptor::from_json(
            r#"{"Objects":[{"id":"a","md5":"x","layer":18446744073709551615}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SceneError::Invalid(_)));

        let err = SceneDescriptor::from_json(
            r#"{"Renderers":[{"layer":1000000000,"LookAt":[30,0,0,0,0,1,0,0,0,10]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SceneError::Invalid(_)));

        let last = format!(r#"{{"objects":[{{"id":"a","md5":"x","layer":{}}}]}}"#, MAX_LAYERS - 1);
        let d = SceneDescriptor::from_json(&last).expect("parse");
        assert_eq!(d.layer_count(), MAX_LAYERS);
    }

    #[test]
    fn layer_count_saturates_on_unvalidated_descriptors() {
        let mut d = SceneDescriptor::from_json(SERVER_JSON).expect("parse");
        d.objects[0].layer = usize::MAX;
        assert_eq!(d.layer_count(), usize::MAX);
        assert!(d.validate().is_err());
    }

    #[test]
    fn short_look_at_is_rejected() {
        let err = SceneDescriptor::from_json(r#"{"renderers":[{"lookAt":[1,2,3]}]}"#).unwrap_err();
        assert!(matches!(err, SceneError::Json(_)));
    }

    #[test]
    fn empty_object_is_an_empty_scene() {
        let d = SceneDescriptor::from_json("{}").expect("parse");
        assert_eq!(d, SceneDescriptor::default());
        assert_eq!(d.layer_count(), 0);
    }

    #[test]
    fn object_key_displays_id_and_md5() {
        assert_eq!(ObjectKey::new("7", "bb").to_string(), "7@bb");
    }
}
