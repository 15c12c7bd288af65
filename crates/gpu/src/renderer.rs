use formats::{ColorMapWidget, ObjectKey, Primitive};
use foundation::math::{Mat4, normal_matrix};
use scene::{LayerView, SceneGraph, UserTransform, Viewport, layer_view, vec3};
use streaming::ObjectCache;

use crate::backend::{
    Capability, DrawCall, GpuBackend, GpuError, ProgramId, ProgramKind, Topology, Uniforms,
};
use crate::matrix_stack::MatrixStack;
use crate::overlay::{ColorMapLayout, Overlay2d};
use crate::primitive::{GpuGeometry, GpuPrimitive};
use crate::programs::{BACKGROUND_VERTICES, program_for};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderConfig {
    pub near: f32,
    pub far: f32,
    /// Point sprite edge in pixels.
    pub point_size: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            near: 0.01,
            far: 10_000.0,
            point_size: 2.0,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub layers: usize,
    pub draws: u32,
    /// Display-list entries with nothing complete to draw yet.
    pub skipped: u32,
    pub failures: u32,
    pub color_maps: u32,
}

#[derive(Debug, Copy, Clone)]
struct Programs {
    lit: ProgramId,
    points: ProgramId,
    background: ProgramId,
}

impl Programs {
    fn get(&self, kind: ProgramKind) -> ProgramId {
        match kind {
            ProgramKind::Lit => self.lit,
            ProgramKind::Points => self.points,
            ProgramKind::Background => self.background,
        }
    }
}

/// Multi-layer compositing draw loop over a [`GpuBackend`].
///
/// Owns the backend. GPU primitives are created and released through it but
/// are owned by the object cache between those calls.
pub struct RenderPipeline<B: GpuBackend> {
    backend: B,
    config: RenderConfig,
    programs: Programs,
    size: (u32, u32),
    applied_size: Option<(u32, u32)>,
}

/// Per-layer state shared by every object drawn in it.
struct LayerPass {
    base: Mat4,
    projection: Mat4,
    viewport: Viewport,
}

impl<B: GpuBackend> RenderPipeline<B> {
    /// Compiles the programs. Any failure is fatal for this pipeline.
    pub fn new(mut backend: B, config: RenderConfig) -> Result<Self, GpuError> {
        let mut create = |kind| {
            backend.create_program(kind).inspect_err(|err| {
                tracing::error!(?kind, error = %err, "program creation failed");
            })
        };
        let programs = Programs {
            lit: create(ProgramKind::Lit)?,
            points: create(ProgramKind::Points)?,
            background: create(ProgramKind::Background)?,
        };
        Ok(Self {
            backend,
            config,
            programs,
            size: (1, 1),
            applied_size: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Canvas size in pixels; applied to the backend on the next draw.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
    }

    pub fn upload(&mut self, primitive: Primitive) -> Result<GpuPrimitive, GpuError> {
        GpuPrimitive::upload(&mut self.backend, primitive)
    }

    pub fn release(&mut self, primitive: GpuPrimitive) {
        primitive.release(&mut self.backend);
    }

    /// Draws one frame. Only frame-level failures are returned; objects that
    /// fail to draw are logged and counted in the stats.
    pub fn draw(
        &mut self,
        scene: &SceneGraph,
        cache: &ObjectCache<GpuPrimitive>,
        transform: &UserTransform,
        overlay: &mut dyn Overlay2d,
    ) -> Result<FrameStats, GpuError> {
        let (width, height) = self.size;
        if self.applied_size != Some(self.size) {
            self.backend.resize(width, height);
            self.applied_size = Some(self.size);
        }

        self.backend.begin_frame()?;
        let background = scene.background();
        let [r, g, b] = background.bottom;
        self.backend.clear([r, g, b, 1.0]);

        let mut stats = FrameStats::default();
        self.draw_background(scene, &mut stats);

        let mut color_maps: Vec<&ColorMapWidget> = Vec::new();
        for layer in (0..scene.layer_count()).rev() {
            let Some(camera) = scene.camera(layer) else {
                continue;
            };
            let LayerView {
                viewport,
                view,
                projection,
            } = layer_view(camera, width, height, self.config.near, self.config.far);
            if viewport.is_empty() {
                continue;
            }
            let Some(list) = scene.display_list(layer) else {
                continue;
            };
            stats.layers += 1;
            self.backend.set_viewport(viewport);

            let base = if layer == 0 {
                view * transform.world_matrix(view, vec3(scene.center()))
            } else {
                view
            };
            let pass = LayerPass {
                base,
                projection,
                viewport,
            };

            self.backend.disable(Capability::Blend);
            for key in &list.solid {
                self.draw_object(key, cache, &pass, &mut stats, &mut color_maps);
            }

            self.backend.enable(Capability::Blend);
            self.backend.enable(Capability::PolygonOffsetFill);
            for key in &list.transparent {
                self.draw_object(key, cache, &pass, &mut stats, &mut color_maps);
            }
            self.backend.disable(Capability::Blend);
            self.backend.disable(Capability::PolygonOffsetFill);
        }

        overlay.begin(width, height);
        for widget in color_maps {
            let layout = ColorMapLayout::compute(widget, width, height);
            match overlay.draw_color_map(&layout) {
                Ok(()) => stats.color_maps += 1,
                Err(err) => {
                    stats.failures += 1;
                    tracing::warn!(title = %widget.title, error = %err, "color map draw failed");
                }
            }
        }

        self.backend.end_frame()?;
        Ok(stats)
    }

    fn draw_background(&mut self, scene: &SceneGraph, stats: &mut FrameStats) {
        let background = scene.background();
        let (width, height) = self.size;
        let [br, bg, bb] = background.bottom;
        let [tr, tg, tb] = background.top;

        self.backend.set_viewport(Viewport::full(width, height));
        self.backend.disable(Capability::DepthTest);
        self.backend.use_program(self.programs.background);
        self.backend.set_uniforms(&Uniforms {
            background_bottom: [br, bg, bb, 1.0],
            background_top: [tr, tg, tb, 1.0],
            viewport: [width as f32, height as f32, self.config.point_size, 0.0],
            ..Uniforms::default()
        });
        let call = DrawCall {
            topology: Topology::Triangles,
            vertex_count: BACKGROUND_VERTICES,
            streams: None,
            index: None,
        };
        if let Err(err) = self.backend.draw(&call) {
            stats.failures += 1;
            tracing::warn!(error = %err, "background draw failed");
        }
        self.backend.enable(Capability::DepthTest);
    }

    fn draw_object<'c>(
        &mut self,
        key: &ObjectKey,
        cache: &'c ObjectCache<GpuPrimitive>,
        pass: &LayerPass,
        stats: &mut FrameStats,
        color_maps: &mut Vec<&'c ColorMapWidget>,
    ) {
        let Some(entry) = cache.renderable(key) else {
            stats.skipped += 1;
            return;
        };
        let mut stack = MatrixStack::new(pass.base);
        for primitive in entry.resident_parts() {
            match primitive {
                GpuPrimitive::Mesh(geometry)
                | GpuPrimitive::Lines(geometry)
                | GpuPrimitive::Points(geometry) => {
                    stack.push();
                    stack.multiply(geometry.matrix);
                    let model_view = stack.top();
                    stack.pop();
                    match self.draw_geometry(geometry, model_view, pass) {
                        Ok(()) => stats.draws += 1,
                        Err(err) => {
                            stats.failures += 1;
                            tracing::warn!(key = %key, error = %err, "object draw failed");
                        }
                    }
                }
                GpuPrimitive::ColorMap(widget) => color_maps.push(widget),
                GpuPrimitive::Empty => {}
            }
        }
    }

    fn draw_geometry(&mut self, geometry: &GpuGeometry, model_view: Mat4, pass: &LayerPass) -> Result<(), GpuError> {
        let normal = Mat4::from_mat3(normal_matrix(model_view));
        self.backend
            .use_program(self.programs.get(program_for(geometry.topology)));
        self.backend.set_uniforms(&Uniforms {
            projection: pass.projection.to_cols_array_2d(),
            model_view: model_view.to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
            viewport: [
                pass.viewport.width as f32,
                pass.viewport.height as f32,
                self.config.point_size,
                0.0,
            ],
            ..Uniforms::default()
        });
        self.backend.draw(&geometry.draw_call())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{GpuCall, RecordingBackend, RecordingOverlay};
    use formats::{
        ColorMapWidget, ColorStop, IDENTITY_ROW_MAJOR, LayerCamera, Mesh, ObjectMeta, Orientation,
        SceneDescriptor,
    };
    use foundation::math::{approx_eq_mat4, mat4_from_row_major};
    use pretty_assertions::assert_eq;
    use scene::view_matrix;

    fn camera(index: usize, origin: [f64; 2], size: [f64; 2]) -> LayerCamera {
        LayerCamera {
            index,
            look_at: [30.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 10.0],
            background1: [0.1, 0.2, 0.3],
            background2: Some([0.4, 0.5, 0.6]),
            origin,
            size,
        }
    }

    fn object(id: &str, layer: usize, transparent: bool) -> ObjectMeta {
        ObjectMeta {
            id: id.to_string(),
            md5: "v1".to_string(),
            layer,
            parts: 1,
            has_transparency: transparent,
        }
    }

    fn translated_triangle(x: f32) -> Primitive {
        let mut matrix = IDENTITY_ROW_MAJOR;
        matrix[3] = x;
        Primitive::Mesh(Mesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            colors: vec![1.0; 12],
            indices: vec![0, 1, 2],
            matrix,
        })
    }

    fn color_map() -> Primitive {
        Primitive::ColorMap(ColorMapWidget {
            position: [0.0, 0.0],
            size: [0.5, 0.5],
            stops: vec![ColorStop {
                scalar: 0.0,
                rgb: [1.0, 1.0, 1.0],
            }],
            orientation: Orientation::Vertical,
            num_labels: 2,
            title: "T".to_string(),
        })
    }

    struct Fixture {
        pipeline: RenderPipeline<RecordingBackend>,
        scene: SceneGraph,
        cache: ObjectCache<GpuPrimitive>,
        overlay: RecordingOverlay,
    }

    impl Fixture {
        /// Builds a scene where every object is resident, using `make` per id.
        fn new(descriptor: SceneDescriptor, make: impl Fn(&str) -> Primitive) -> Self {
            let mut pipeline =
                RenderPipeline::new(RecordingBackend::new(), RenderConfig::default()).expect("programs");
            pipeline.set_size(800, 600);
            let mut scene = SceneGraph::new();
            scene.update(&descriptor);
            let mut cache = ObjectCache::new();
            for request in cache.reconcile(&descriptor) {
                let gpu = pipeline.upload(make(&request.token.key.id)).expect("upload");
                if cache.insert(&request.token, gpu).is_err() {
                    panic!("insert {}", request.token);
                }
            }
            pipeline.backend_mut().clear_calls();
            Self {
                pipeline,
                scene,
                cache,
                overlay: RecordingOverlay::new(),
            }
        }

        fn draw(&mut self, transform: &UserTransform) -> FrameStats {
            self.pipeline
                .draw(&self.scene, &self.cache, transform, &mut self.overlay)
                .expect("frame")
        }
    }

    fn world_scene(objects: Vec<ObjectMeta>) -> SceneDescriptor {
        SceneDescriptor {
            objects,
            renderers: vec![camera(0, [0.0, 0.0], [1.0, 1.0])],
            center: [0.0, 0.0, 0.0],
        }
    }

    #[test]
    fn background_is_drawn_without_depth_test_before_geometry() {
        let mut f = Fixture::new(world_scene(vec![object("a", 0, false)]), |_| translated_triangle(0.0));
        let stats = f.draw(&UserTransform::default());
        assert_eq!(stats.draws, 1);

        let backend = f.pipeline.backend();
        let calls = backend.calls();
        let disable = backend
            .position_of(&GpuCall::Disable(Capability::DepthTest))
            .expect("depth disabled");
        let enable = backend
            .position_of(&GpuCall::Enable(Capability::DepthTest))
            .expect("depth enabled");
        let draws: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, GpuCall::Draw(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(draws.len(), 2);
        assert!(disable < draws[0]);
        assert!(draws[0] < enable);
        assert!(enable < draws[1]);

        assert_eq!(backend.draws()[0].vertex_count, BACKGROUND_VERTICES);
        assert_eq!(backend.draws()[0].streams, None);
        assert_eq!(calls.first(), Some(&GpuCall::Resize(800, 600)));
        assert_eq!(calls.last(), Some(&GpuCall::EndFrame));
    }

    #[test]
    fn background_uniforms_carry_the_gradient() {
        let mut f = Fixture::new(world_scene(Vec::new()), |_| translated_triangle(0.0));
        f.draw(&UserTransform::default());
        let uniforms = f.pipeline.backend().draw_uniforms();
        assert_eq!(uniforms[0].background_bottom, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(uniforms[0].background_top, [0.4, 0.5, 0.6, 1.0]);
        assert!(
            f.pipeline
                .backend()
                .position_of(&GpuCall::Clear([0.1, 0.2, 0.3, 1.0]))
                .is_some()
        );
    }

    #[test]
    fn identity_interaction_gives_view_times_object_matrix() {
        let mut f = Fixture::new(world_scene(vec![object("a", 0, false)]), |_| translated_triangle(2.0));
        f.draw(&UserTransform::default());

        let view = view_matrix(&camera(0, [0.0, 0.0], [1.0, 1.0]));
        let mut row_major = IDENTITY_ROW_MAJOR;
        row_major[3] = 2.0;
        let expected = view * mat4_from_row_major(&row_major);

        let uniforms = f.pipeline.backend().draw_uniforms();
        let mv = Mat4::from_cols_array_2d(&uniforms[1].model_view);
        assert!(approx_eq_mat4(mv, expected, 1e-5));
    }

    #[test]
    fn user_transform_only_applies_to_the_world_layer() {
        let mut descriptor = world_scene(vec![object("a", 0, false), object("b", 1, false)]);
        descriptor.renderers.push(camera(1, [0.75, 0.0], [0.25, 0.25]));
        let mut f = Fixture::new(descriptor, |_| translated_triangle(0.0));

        let transform = UserTransform {
            scale: 2.0,
            ..UserTransform::default()
        };
        f.draw(&transform);

        let view = view_matrix(&camera(0, [0.0, 0.0], [1.0, 1.0]));
        let uniforms = f.pipeline.backend().draw_uniforms();
        // Layer 1 is drawn first.
        let inset = Mat4::from_cols_array_2d(&uniforms[1].model_view);
        let world = Mat4::from_cols_array_2d(&uniforms[2].model_view);
        assert!(approx_eq_mat4(inset, view, 1e-5));
        assert!(!approx_eq_mat4(world, view, 1e-3));
    }

    #[test]
    fn layers_are_visited_from_last_to_first() {
        let mut descriptor = world_scene(vec![object("a", 0, false), object("b", 1, false)]);
        descriptor.renderers.push(camera(1, [0.75, 0.0], [0.25, 0.25]));
        let mut f = Fixture::new(descriptor, |_| translated_triangle(0.0));
        let stats = f.draw(&UserTransform::default());
        assert_eq!(stats.layers, 2);

        let viewports: Vec<Viewport> = f
            .pipeline
            .backend()
            .calls()
            .iter()
            .filter_map(|c| match c {
                GpuCall::SetViewport(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(
            viewports,
            vec![
                Viewport::full(800, 600),
                Viewport {
                    x: 600,
                    y: 0,
                    width: 200,
                    height: 150,
                },
                Viewport::full(800, 600),
            ]
        );
    }

    #[test]
    fn transparent_objects_draw_with_blend_and_polygon_offset() {
        let mut f = Fixture::new(
            world_scene(vec![object("solid", 0, false), object("glass", 0, true)]),
            |_| translated_triangle(0.0),
        );
        f.draw(&UserTransform::default());

        let backend = f.pipeline.backend();
        let state: Vec<&GpuCall> = backend
            .calls()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    GpuCall::Enable(Capability::Blend | Capability::PolygonOffsetFill)
                        | GpuCall::Disable(Capability::Blend | Capability::PolygonOffsetFill)
                        | GpuCall::Draw(_)
                )
            })
            .collect();
        let background = GpuCall::Draw(backend.draws()[0]);
        let solid = GpuCall::Draw(backend.draws()[1]);
        let glass = GpuCall::Draw(backend.draws()[2]);
        assert_eq!(
            state,
            vec![
                &background,
                &GpuCall::Disable(Capability::Blend),
                &solid,
                &GpuCall::Enable(Capability::Blend),
                &GpuCall::Enable(Capability::PolygonOffsetFill),
                &glass,
                &GpuCall::Disable(Capability::Blend),
                &GpuCall::Disable(Capability::PolygonOffsetFill),
            ]
        );
    }

    #[test]
    fn failing_object_does_not_abort_the_frame() {
        let mut f = Fixture::new(
            world_scene(vec![object("bad", 0, false), object("good", 0, false)]),
            |_| translated_triangle(0.0),
        );
        let bad = ObjectKey::new("bad", "v1");
        let position = f
            .cache
            .entry(&bad)
            .and_then(|e| e.resident_parts().next())
            .and_then(GpuPrimitive::geometry)
            .map(|g| g.streams.position)
            .expect("resident");
        f.pipeline.backend_mut().fail_draws_of(position);

        let stats = f.draw(&UserTransform::default());
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.draws, 1);
        assert_eq!(f.pipeline.backend().calls().last(), Some(&GpuCall::EndFrame));
    }

    #[test]
    fn incomplete_objects_are_skipped() {
        let descriptor = world_scene(vec![object("a", 0, false)]);
        let mut pipeline = RenderPipeline::new(RecordingBackend::new(), RenderConfig::default()).expect("programs");
        let mut scene = SceneGraph::new();
        scene.update(&descriptor);
        let mut cache: ObjectCache<GpuPrimitive> = ObjectCache::new();
        cache.reconcile(&descriptor);

        let mut overlay = RecordingOverlay::new();
        let stats = pipeline
            .draw(&scene, &cache, &UserTransform::default(), &mut overlay)
            .expect("frame");
        assert_eq!(stats.skipped, 1);
        assert_eq!(pipeline.backend().draws().len(), 1);
    }

    #[test]
    fn color_maps_go_through_the_overlay() {
        let mut f = Fixture::new(
            world_scene(vec![object("mesh", 0, false), object("legend", 0, false)]),
            |id| {
                if id == "legend" {
                    color_map()
                } else {
                    translated_triangle(0.0)
                }
            },
        );
        let stats = f.draw(&UserTransform::default());
        assert_eq!(stats.color_maps, 1);
        assert_eq!(stats.draws, 1);
        assert_eq!(f.overlay.size, (800, 600));
        assert_eq!(f.overlay.drawn.len(), 1);
        assert_eq!(f.overlay.drawn[0].title, "T");
        assert_eq!(f.overlay.drawn[0].labels.len(), 2);
    }

    #[test]
    fn program_failure_is_fatal() {
        let mut backend = RecordingBackend::new();
        backend.fail_program(ProgramKind::Points);
        let err = RenderPipeline::new(backend, RenderConfig::default()).err();
        assert!(matches!(
            err,
            Some(GpuError::Program {
                kind: ProgramKind::Points,
                ..
            })
        ));
    }

    #[test]
    fn resize_is_applied_once_per_change() {
        let mut f = Fixture::new(world_scene(Vec::new()), |_| translated_triangle(0.0));
        f.draw(&UserTransform::default());
        f.draw(&UserTransform::default());
        f.pipeline.set_size(1024, 768);
        f.draw(&UserTransform::default());
        let resizes: Vec<&GpuCall> = f
            .pipeline
            .backend()
            .calls()
            .iter()
            .filter(|c| matches!(c, GpuCall::Resize(..)))
            .collect();
        assert_eq!(resizes, vec![&GpuCall::Resize(800, 600), &GpuCall::Resize(1024, 768)]);
    }
}
