use formats::LayerCamera;
use foundation::math::{Mat4, Vec3, Vec4, rotation_part, rotation_x, rotation_y, translation, uniform_scale};

use crate::camera::{vec3, view_matrix};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MouseAction {
    Down,
    Move,
    Up,
    Wheel,
}

/// Pointer input in canvas pixels, y growing downwards. `delta` is only
/// meaningful for `Wheel` (positive scrolls away from the user).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MouseEvent {
    pub action: MouseAction,
    pub button: u8,
    pub x: f64,
    pub y: f64,
    pub delta: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InteractionConfig {
    pub rotation_factor: f32,
    pub pan_factor: f32,
    pub zoom_factor: f32,
    pub min_scale: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            rotation_factor: 1.0 / 50.0,
            pan_factor: 0.001,
            zoom_factor: 0.005,
            min_scale: 0.01,
        }
    }
}

/// Client-side manipulation of the world layer, expressed in camera space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UserTransform {
    pub translation: Vec3,
    pub scale: f32,
    pub rotation: Mat4,
}

impl Default for UserTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: 1.0,
            rotation: Mat4::IDENTITY,
        }
    }
}

impl UserTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// World-space transform applied to layer-0 objects before `view`.
    ///
    /// `(R⁻¹·T·R) · Tc · (R⁻¹·S·Ru·R) · T−c` where `R` is the rotation part of
    /// `view`: translation and rotation happen in camera space, scale and
    /// rotation pivot around the scene center.
    pub fn world_matrix(&self, view: Mat4, center: Vec3) -> Mat4 {
        let r = rotation_part(view);
        let r_inv = r.transpose();
        let camera_translation = r_inv * translation(self.translation) * r;
        let camera_rotation = r_inv * uniform_scale(self.scale) * self.rotation * r;
        camera_translation * translation(center) * camera_rotation * translation(-center)
    }
}

/// Camera pose in world coordinates, as pushed back with `updateCamera`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraPose {
    pub focal_point: [f64; 3],
    pub view_up: [f64; 3],
    pub eye: [f64; 3],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Unchanged,
    Updated,
    DragEnded,
}

#[derive(Debug, Copy, Clone)]
struct Drag {
    button: u8,
    last: (f64, f64),
    moved: bool,
}

/// Mouse drag/wheel state machine over a [`UserTransform`].
///
/// Button 0 rotates, button 1 pans, any other button zooms with vertical
/// motion, the wheel zooms. No inertia: the transform only changes on input.
#[derive(Debug, Clone)]
pub struct InteractionController {
    config: InteractionConfig,
    transform: UserTransform,
    drag: Option<Drag>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            transform: UserTransform::default(),
            drag: None,
        }
    }

    pub fn transform(&self) -> &UserTransform {
        &self.transform
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Back to identity; used when the server moves the world camera.
    pub fn reset(&mut self) {
        self.transform = UserTransform::default();
    }

    /// `depth` is the eye-to-focal distance of the world camera; pans scale
    /// with it so a pixel of motion covers a similar screen distance at any zoom.
    pub fn handle(&mut self, event: MouseEvent, depth: f32) -> InteractionOutcome {
        match event.action {
            MouseAction::Down => {
                self.drag = Some(Drag {
                    button: event.button,
                    last: (event.x, event.y),
                    moved: false,
                });
                InteractionOutcome::Unchanged
            }
            MouseAction::Move => {
                let Some(drag) = self.drag.as_mut() else {
                    return InteractionOutcome::Unchanged;
                };
                let dx = (event.x - drag.last.0) as f32;
                let dy = (event.y - drag.last.1) as f32;
                drag.last = (event.x, event.y);
                if dx == 0.0 && dy == 0.0 {
                    return InteractionOutcome::Unchanged;
                }
                drag.moved = true;
                let button = drag.button;
                match button {
                    0 => self.rotate(dx, dy),
                    1 => self.pan(dx, dy, depth),
                    _ => self.zoom(-dy),
                }
                InteractionOutcome::Updated
            }
            MouseAction::Up => match self.drag.take() {
                Some(drag) if drag.moved => InteractionOutcome::DragEnded,
                _ => InteractionOutcome::Unchanged,
            },
            MouseAction::Wheel => {
                if event.delta == 0.0 {
                    return InteractionOutcome::Unchanged;
                }
                self.zoom(-(event.delta as f32));
                InteractionOutcome::Updated
            }
        }
    }

    fn rotate(&mut self, dx: f32, dy: f32) {
        let f = self.config.rotation_factor;
        self.transform.rotation = rotation_y(dx * f) * rotation_x(dy * f) * self.transform.rotation;
    }

    fn pan(&mut self, dx: f32, dy: f32, depth: f32) {
        let k = self.config.pan_factor * depth.max(f32::EPSILON) / self.transform.scale;
        self.transform.translation += Vec3::new(dx * k, -dy * k, 0.0);
    }

    fn zoom(&mut self, amount: f32) {
        let scaled = self.transform.scale * (amount * self.config.zoom_factor).exp();
        self.transform.scale = scaled.max(self.config.min_scale);
    }

    /// World camera pose equivalent to viewing the untransformed scene
    /// through `camera` with the current user transform applied.
    pub fn effective_camera(&self, camera: &LayerCamera, center: [f64; 3]) -> CameraPose {
        let view = view_matrix(camera);
        let world = self.transform.world_matrix(view, vec3(center));
        let inv = (view * world).inverse();

        let depth = camera.depth() as f32;
        let eye = inv * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let focal = inv * Vec4::new(0.0, 0.0, -depth, 1.0);
        let up = (inv * Vec4::new(0.0, 1.0, 0.0, 0.0)).truncate().normalize_or_zero();

        let arr = |v: Vec3| [f64::from(v.x), f64::from(v.y), f64::from(v.z)];
        CameraPose {
            focal_point: arr(focal.truncate() / focal.w),
            view_up: arr(up),
            eye: arr(eye.truncate() / eye.w),
        }
    }
}
