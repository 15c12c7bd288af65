use formats::LayerCamera;
use foundation::math::{Mat4, Vec3};

/// Pixel rectangle of one layer, origin at the bottom-left of the canvas.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Maps `origin`/`size` canvas fractions to pixels. Negative fractions
    /// clamp to zero.
    pub fn from_fractions(origin: [f64; 2], size: [f64; 2], canvas_width: u32, canvas_height: u32) -> Self {
        let px = |fraction: f64, extent: u32| (fraction.max(0.0) * f64::from(extent)).round() as u32;
        Self {
            x: px(origin[0], canvas_width),
            y: px(origin[1], canvas_height),
            width: px(size[0], canvas_width),
            height: px(size[1], canvas_height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerView {
    pub viewport: Viewport,
    pub view: Mat4,
    pub projection: Mat4,
}

pub fn vec3(v: [f64; 3]) -> Vec3 {
    Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

/// View matrix from eye, focal point and up. Degenerate cameras (eye on the
/// focal point, up parallel to the view direction) are nudged into a valid
/// basis instead of producing NaNs.
pub fn view_matrix(camera: &LayerCamera) -> Mat4 {
    let focal = vec3(camera.focal_point());
    let mut eye = vec3(camera.eye());
    if (eye - focal).length_squared() <= f32::EPSILON {
        eye = focal + Vec3::Z;
    }

    let forward = (focal - eye).normalize();
    let mut up = vec3(camera.view_up());
    if up.length_squared() <= f32::EPSILON || forward.cross(up.normalize()).length_squared() <= 1e-8 {
        up = if forward.y.abs() < 0.99 { Vec3::Y } else { Vec3::Z };
    }
    Mat4::look_at_rh(eye, focal, up.normalize())
}

/// Perspective projection with the layer's vertical field of view, depth 0..1.
pub fn projection_matrix(camera: &LayerCamera, aspect: f32, near: f32, far: f32) -> Mat4 {
    let fov = (camera.fov_degrees() as f32).clamp(1.0, 179.0).to_radians();
    let near = near.max(1e-6);
    let far = far.max(near * 2.0);
    Mat4::perspective_rh(fov, aspect.max(1e-6), near, far)
}

pub fn layer_view(camera: &LayerCamera, canvas_width: u32, canvas_height: u32, near: f32, far: f32) -> LayerView {
    let viewport = Viewport::from_fractions(camera.origin, camera.size, canvas_width, canvas_height);
    LayerView {
        viewport,
        view: view_matrix(camera),
        projection: projection_matrix(camera, viewport.aspect(), near, far),
    }
}
