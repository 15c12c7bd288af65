//! GL-like seam between the render pipeline and a concrete graphics API.
//!
//! The pipeline drives state the way a WebGL renderer would (capabilities,
//! viewport, bound program, uniforms, draw). Backends translate that into
//! whatever their API needs; the wgpu backend records it and replays it into
//! a render pass at `end_frame`.

use scene::Viewport;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    Blend,
    PolygonOffsetFill,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgramKind {
    /// Meshes and line sets: position, normal, color.
    Lit,
    /// Screen-sized points: position, color.
    Points,
    /// Full-screen gradient, no vertex buffers.
    Background,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
    Points,
}

/// Per-draw uniform block, laid out for WGSL (`mat4x4<f32>` columns, 16-byte
/// aligned vectors).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Uniforms {
    pub projection: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    /// Inverse-transpose of the model-view 3x3, padded to 4x4.
    pub normal_matrix: [[f32; 4]; 4],
    pub background_bottom: [f32; 4],
    pub background_top: [f32; 4],
    /// Viewport width and height in pixels, point size in pixels, unused.
    pub viewport: [f32; 4],
}

impl Default for Uniforms {
    fn default() -> Self {
        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        Self {
            projection: identity,
            model_view: identity,
            normal_matrix: identity,
            background_bottom: [0.0, 0.0, 0.0, 1.0],
            background_top: [0.0, 0.0, 0.0, 1.0],
            viewport: [1.0, 1.0, 1.0, 0.0],
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexStreams {
    pub position: BufferId,
    pub normal: Option<BufferId>,
    pub color: BufferId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexRange {
    pub buffer: BufferId,
    pub count: u32,
}

/// One draw with the currently bound program and uniforms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawCall {
    pub topology: Topology,
    pub vertex_count: u32,
    pub streams: Option<VertexStreams>,
    pub index: Option<IndexRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("GPU program {kind:?} could not be created: {message}")]
    Program { kind: ProgramKind, message: String },
    #[error("buffer upload failed: {0}")]
    Buffer(String),
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("surface unavailable: {0}")]
    Surface(String),
}

pub trait GpuBackend {
    fn create_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError>;
    fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8]) -> Result<BufferId, GpuError>;
    fn delete_buffer(&mut self, buffer: BufferId);

    fn resize(&mut self, width: u32, height: u32);
    fn begin_frame(&mut self) -> Result<(), GpuError>;
    /// Clears color and depth of the whole surface.
    fn clear(&mut self, color: [f32; 4]);
    fn set_viewport(&mut self, viewport: Viewport);
    fn enable(&mut self, capability: Capability);
    fn disable(&mut self, capability: Capability);
    fn use_program(&mut self, program: ProgramId);
    fn set_uniforms(&mut self, uniforms: &Uniforms);
    fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError>;
    fn end_frame(&mut self) -> Result<(), GpuError>;
}
