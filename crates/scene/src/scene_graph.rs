use std::collections::BTreeSet;

use formats::{LOOK_AT_LEN, LayerCamera, MAX_LAYERS, ObjectKey, SceneDescriptor};

/// Objects of one layer, split by blending pass. Order follows the descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayList {
    pub solid: Vec<ObjectKey>,
    pub transparent: Vec<ObjectKey>,
}

impl DisplayList {
    pub fn len(&self) -> usize {
        self.solid.len() + self.transparent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solid.is_empty() && self.transparent.is_empty()
    }
}

/// Background gradient of the world layer, bottom to top.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Background {
    pub bottom: [f32; 3],
    pub top: [f32; 3],
}

impl Background {
    pub fn flat(color: [f32; 3]) -> Self {
        Self {
            bottom: color,
            top: color,
        }
    }

    pub fn is_gradient(&self) -> bool {
        self.bottom != self.top
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::flat([0.0, 0.0, 0.0])
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SceneUpdate {
    /// The world camera moved on the server; the user transform must be reset.
    pub camera_reset: bool,
    pub layers: usize,
    pub objects: usize,
}

/// Per-layer display lists and cameras of the current scene descriptor.
#[derive(Debug, Default)]
pub struct SceneGraph {
    layers: Vec<DisplayList>,
    cameras: Vec<LayerCamera>,
    center: [f64; 3],
    world_look_at: Option<[f64; LOOK_AT_LEN]>,
    revision: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds every display list from `descriptor`. Objects on layers at or
    /// beyond [`MAX_LAYERS`] are dropped.
    pub fn update(&mut self, descriptor: &SceneDescriptor) -> SceneUpdate {
        let mut layers = vec![DisplayList::default(); descriptor.layer_count().min(MAX_LAYERS)];
        for object in &descriptor.objects {
            let Some(list) = layers.get_mut(object.layer) else {
                tracing::warn!(id = %object.id, layer = object.layer, "object layer out of range");
                continue;
            };
            if object.has_transparency {
                list.transparent.push(object.key());
            } else {
                list.solid.push(object.key());
            }
        }

        let mut cameras = descriptor.renderers.clone();
        cameras.sort_by_key(|c| c.index);

        // Exact comparison: float noise in lookAt also resets.
        let world_look_at = descriptor.camera(0).map(|c| c.look_at);
        let camera_reset = world_look_at.is_some() && world_look_at != self.world_look_at;

        for (index, list) in layers.iter().enumerate() {
            if !list.is_empty() && descriptor.camera(index).is_none() {
                tracing::warn!(layer = index, objects = list.len(), "layer has objects but no camera");
            }
        }

        self.layers = layers;
        self.cameras = cameras;
        self.center = descriptor.center;
        if world_look_at.is_some() {
            self.world_look_at = world_look_at;
        }
        self.revision += 1;

        let update = SceneUpdate {
            camera_reset,
            layers: self.layers.len(),
            objects: descriptor.objects.len(),
        };
        tracing::debug!(
            revision = self.revision,
            layers = update.layers,
            objects = update.objects,
            camera_reset,
            "scene updated"
        );
        update
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn display_list(&self, layer: usize) -> Option<&DisplayList> {
        self.layers.get(layer)
    }

    pub fn layers(&self) -> &[DisplayList] {
        &self.layers
    }

    pub fn camera(&self, layer: usize) -> Option<&LayerCamera> {
        self.cameras.iter().find(|c| c.index == layer)
    }

    pub fn world_camera(&self) -> Option<&LayerCamera> {
        self.camera(0)
    }

    pub fn center(&self) -> [f64; 3] {
        self.center
    }

    /// Eye-to-focal distance of the world camera, 1 when there is none.
    pub fn world_depth(&self) -> f64 {
        self.world_camera().map(LayerCamera::depth).unwrap_or(1.0)
    }

    pub fn background(&self) -> Background {
        match self.world_camera() {
            Some(c) => Background {
                bottom: c.background1,
                top: c.background2.unwrap_or(c.background1),
            },
            None => Background::default(),
        }
    }

    pub fn referenced_keys(&self) -> BTreeSet<ObjectKey> {
        self.layers
            .iter()
            .flat_map(|l| l.solid.iter().chain(l.transparent.iter()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formats::ObjectMeta;
    use pretty_assertions::assert_eq;

    fn object(id: &str, layer: usize, transparent: bool) -> ObjectMeta {
        ObjectMeta {
            id: id.to_string(),
            md5: format!("{id}-md5"),
            layer,
            parts: 1,
            has_transparency: transparent,
        }
    }

    fn layer_camera(index: usize, eye_z: f64) -> LayerCamera {
        LayerCamera {
            index,
            look_at: [30.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, eye_z],
            background1: [0.1, 0.2, 0.3],
            background2: Some([0.4, 0.5, 0.6]),
            origin: [0.0, 0.0],
            size: [1.0, 1.0],
        }
    }

    fn descriptor(eye_z: f64) -> SceneDescriptor {
        SceneDescriptor {
            objects: vec![
                object("a", 0, false),
                object("b", 0, true),
                object("c", 0, false),
                object("d", 1, false),
            ],
            renderers: vec![layer_camera(1, 5.0), layer_camera(0, eye_z)],
            center: [0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn display_lists_partition_by_layer_and_transparency() {
        let mut graph = SceneGraph::new();
        let update = graph.update(&descriptor(10.0));
        assert_eq!(update.layers, 2);

        let world = graph.display_list(0).expect("layer 0");
        assert_eq!(world.solid, vec![ObjectKey::new("a", "a-md5"), ObjectKey::new("c", "c-md5")]);
        assert_eq!(world.transparent, vec![ObjectKey::new("b", "b-md5")]);

        let inset = graph.display_list(1).expect("layer 1");
        assert_eq!(inset.solid, vec![ObjectKey::new("d", "d-md5")]);
        assert!(inset.transparent.is_empty());

        assert_eq!(graph.referenced_keys().len(), 4);
    }

    #[test]
    fn out_of_range_layers_are_dropped() {
        let mut d = descriptor(10.0);
        d.objects.push(object("far", usize::MAX, false));
        d.objects.push(object("beyond", MAX_LAYERS, true));

        let mut graph = SceneGraph::new();
        let update = graph.update(&d);
        assert_eq!(update.layers, MAX_LAYERS);
        assert!(graph.display_list(MAX_LAYERS).is_none());
        let keys: Vec<String> = graph.referenced_keys().into_iter().map(|k| k.id).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn update_replaces_previous_lists() {
        let mut graph = SceneGraph::new();
        graph.update(&descriptor(10.0));
        let mut smaller = descriptor(10.0);
        smaller.objects.truncate(1);
        graph.update(&smaller);
        assert_eq!(graph.referenced_keys().len(), 1);
        assert!(graph.display_list(1).expect("camera keeps layer").is_empty());
    }

    #[test]
    fn camera_reset_only_when_world_look_at_changes() {
        let mut graph = SceneGraph::new();
        assert!(graph.update(&descriptor(10.0)).camera_reset);
        assert!(!graph.update(&descriptor(10.0)).camera_reset);
        assert!(graph.update(&descriptor(10.000001)).camera_reset);

        let mut inset_moved = descriptor(10.000001);
        inset_moved.renderers[0].look_at[9] = 99.0;
        assert!(!graph.update(&inset_moved).camera_reset);
    }

    #[test]
    fn background_and_depth_come_from_world_layer() {
        let mut graph = SceneGraph::new();
        assert_eq!(graph.background(), Background::default());
        assert_eq!(graph.world_depth(), 1.0);

        graph.update(&descriptor(10.0));
        let bg = graph.background();
        assert_eq!(bg.bottom, [0.1, 0.2, 0.3]);
        assert_eq!(bg.top, [0.4, 0.5, 0.6]);
        assert!(bg.is_gradient());
        assert_eq!(graph.world_depth(), 10.0);
        assert_eq!(graph.camera(1).map(|c| c.index), Some(1));
    }
}
