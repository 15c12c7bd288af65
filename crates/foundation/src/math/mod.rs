pub mod matrix;

pub use matrix::*;

pub use glam::{Mat3, Mat4, Vec3, Vec4};
