//! WGSL sources for the three programs. All share the [`Uniforms`] block at
//! group 0, binding 0, bound with a dynamic offset per draw.
//!
//! Vertex locations: 0 position (`f32x3`), 1 normal (`f32x3`), 2 color
//! (`f32x4`). Points read position and color per instance and expand a
//! screen-aligned quad from `vertex_index`.
//!
//! [`Uniforms`]: crate::backend::Uniforms

use crate::backend::{ProgramKind, Topology};

const UNIFORMS: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    model_view: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    background_bottom: vec4<f32>,
    background_top: vec4<f32>,
    viewport: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;
"#;

const LIT: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
) -> VsOut {
    let eye_pos = u.model_view * vec4<f32>(position, 1.0);
    let n = (u.normal_matrix * vec4<f32>(normal, 0.0)).xyz;
    return VsOut(u.projection * eye_pos, n, color);
}

@fragment
fn fs_main(v: VsOut) -> @location(0) vec4<f32> {
    // Line sets carry zero normals and stay unlit.
    if (dot(v.normal, v.normal) < 1e-12) {
        return v.color;
    }
    // Headlight: the light sits at the eye looking down -z.
    let n = normalize(v.normal);
    let diffuse = abs(n.z);
    let shade = 0.2 + 0.8 * diffuse;
    return vec4<f32>(v.color.rgb * shade, v.color.a);
}
"#;

const POINTS: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(
    @builtin(vertex_index) vid: u32,
    @location(0) position: vec3<f32>,
    @location(2) color: vec4<f32>,
) -> VsOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5), vec2<f32>(0.5, -0.5), vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5), vec2<f32>(0.5, 0.5), vec2<f32>(-0.5, 0.5),
    );
    let clip = u.projection * u.model_view * vec4<f32>(position, 1.0);
    let pixels = corners[vid % 6u] * u.viewport.z;
    let offset = pixels * 2.0 / max(u.viewport.xy, vec2<f32>(1.0, 1.0)) * clip.w;
    return VsOut(clip + vec4<f32>(offset, 0.0, 0.0), color);
}

@fragment
fn fs_main(v: VsOut) -> @location(0) vec4<f32> {
    return v.color;
}
"#;

const BACKGROUND: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) t: f32,
};

@vertex
fn vs_main(@builtin(vertex_index) vid: u32) -> VsOut {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(1.0, 1.0), vec2<f32>(-1.0, 1.0),
    );
    let c = corners[vid % 6u];
    return VsOut(vec4<f32>(c, 0.0, 1.0), (c.y + 1.0) * 0.5);
}

@fragment
fn fs_main(v: VsOut) -> @location(0) vec4<f32> {
    return mix(u.background_bottom, u.background_top, v.t);
}
"#;

/// Vertices drawn per point instance.
pub const POINT_QUAD_VERTICES: u32 = 6;

/// Vertices of the full-screen background quad.
pub const BACKGROUND_VERTICES: u32 = 6;

pub fn wgsl_source(kind: ProgramKind) -> String {
    let body = match kind {
        ProgramKind::Lit => LIT,
        ProgramKind::Points => POINTS,
        ProgramKind::Background => BACKGROUND,
    };
    format!("{UNIFORMS}{body}")
}

/// Program used for geometry of `topology`.
pub fn program_for(topology: Topology) -> ProgramKind {
    match topology {
        Topology::Triangles | Topology::Lines => ProgramKind::Lit,
        Topology::Points => ProgramKind::Points,
    }
}
