//! Headless backend and overlay that record every call. Used by the tests of
//! this crate and, through the `testing` feature, the viewer's.

use std::collections::{BTreeSet, HashSet};

use scene::Viewport;

use crate::backend::{
    BufferId, BufferKind, Capability, DrawCall, GpuBackend, GpuError, ProgramId, ProgramKind,
    Uniforms,
};
use crate::overlay::{ColorMapLayout, Overlay2d};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateProgram(ProgramKind),
    CreateBuffer { id: BufferId, kind: BufferKind, len: usize },
    DeleteBuffer(BufferId),
    Resize(u32, u32),
    BeginFrame,
    Clear([f32; 4]),
    SetViewport(Viewport),
    Enable(Capability),
    Disable(Capability),
    UseProgram(ProgramKind),
    SetUniforms(Box<Uniforms>),
    Draw(DrawCall),
    EndFrame,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<GpuCall>,
    programs: Vec<ProgramKind>,
    live: BTreeSet<BufferId>,
    next_buffer: u32,
    failing_programs: HashSet<ProgramKind>,
    failing_draws: HashSet<BufferId>,
    buffers_before_failure: Option<usize>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[GpuCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn live_buffers(&self) -> &BTreeSet<BufferId> {
        &self.live
    }

    /// Draws issued since the last [`clear_calls`](Self::clear_calls).
    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GpuCall::Draw(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    /// Uniforms in effect for each draw, in draw order.
    pub fn draw_uniforms(&self) -> Vec<Uniforms> {
        let mut current = Uniforms::default();
        let mut out = Vec::new();
        for call in &self.calls {
            match call {
                GpuCall::SetUniforms(u) => current = **u,
                GpuCall::Draw(_) => out.push(current),
                _ => {}
            }
        }
        out
    }

    pub fn position_of(&self, call: &GpuCall) -> Option<usize> {
        self.calls.iter().position(|c| c == call)
    }

    pub fn fail_program(&mut self, kind: ProgramKind) {
        self.failing_programs.insert(kind);
    }

    /// Draws reading `buffer` fail with [`GpuError::Draw`].
    pub fn fail_draws_of(&mut self, buffer: BufferId) {
        self.failing_draws.insert(buffer);
    }

    /// The next `n` buffer creations succeed, every later one fails.
    pub fn fail_buffer_after(&mut self, n: usize) {
        self.buffers_before_failure = Some(n);
    }
}

impl GpuBackend for RecordingBackend {
    fn create_program(&mut self, kind: ProgramKind) -> Result<ProgramId, GpuError> {
        self.calls.push(GpuCall::CreateProgram(kind));
        if self.failing_programs.contains(&kind) {
            return Err(GpuError::Program {
                kind,
                message: "rejected by recording backend".to_string(),
            });
        }
        self.programs.push(kind);
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn create_buffer(&mut self, kind: BufferKind, bytes: &[u8]) -> Result<BufferId, GpuError> {
        if let Some(remaining) = self.buffers_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(GpuError::Buffer("out of memory".to_string()));
            }
            *remaining -= 1;
        }
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.live.insert(id);
        self.calls.push(GpuCall::CreateBuffer {
            id,
            kind,
            len: bytes.len(),
        });
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.live.remove(&buffer);
        self.calls.push(GpuCall::DeleteBuffer(buffer));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.calls.push(GpuCall::Resize(width, height));
    }

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.calls.push(GpuCall::BeginFrame);
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(GpuCall::Clear(color));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.calls.push(GpuCall::SetViewport(viewport));
    }

    fn enable(&mut self, capability: Capability) {
        self.calls.push(GpuCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.calls.push(GpuCall::Disable(capability));
    }

    fn use_program(&mut self, program: ProgramId) {
        if let Some(&kind) = self.programs.get(program.0 as usize) {
            self.calls.push(GpuCall::UseProgram(kind));
        }
    }

    fn set_uniforms(&mut self, uniforms: &Uniforms) {
        self.calls.push(GpuCall::SetUniforms(Box::new(*uniforms)));
    }

    fn draw(&mut self, call: &DrawCall) -> Result<(), GpuError> {
        if let Some(streams) = call.streams
            && self.failing_draws.contains(&streams.position)
        {
            return Err(GpuError::Draw(format!("buffer {:?} rejected", streams.position)));
        }
        self.calls.push(GpuCall::Draw(*call));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.calls.push(GpuCall::EndFrame);
        Ok(())
    }
}

/// Overlay that keeps the layouts it was asked to paint during the last frame.
#[derive(Debug, Default)]
pub struct RecordingOverlay {
    pub size: (u32, u32),
    pub frames: u32,
    pub drawn: Vec<ColorMapLayout>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Overlay2d for RecordingOverlay {
    fn begin(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.frames += 1;
        self.drawn.clear();
    }

    fn draw_color_map(&mut self, layout: &ColorMapLayout) -> Result<(), GpuError> {
        self.drawn.push(layout.clone());
        Ok(())
    }
}
