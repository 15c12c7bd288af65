//! Matrix helpers shared by the scene and GPU crates.
//!
//! All matrices are `glam` column-major values. Geometry payloads carry their
//! object matrix as 16 row-major floats, see [`mat4_from_row_major`].

use glam::{Mat3, Mat4, Vec3};

/// Interprets 16 floats as a row-major 4x4 matrix.
pub fn mat4_from_row_major(m: &[f32; 16]) -> Mat4 {
    Mat4::from_cols_array(m).transpose()
}

/// Upper-left 3x3 of `m` embedded in an otherwise identity matrix.
pub fn rotation_part(m: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(m))
}

/// Inverse-transpose of the upper 3x3, used to transform normals.
///
/// Degenerate (non-invertible) inputs yield identity.
pub fn normal_matrix(model_view: Mat4) -> Mat3 {
    let m = Mat3::from_mat4(model_view);
    if m.determinant().abs() <= f32::EPSILON {
        return Mat3::IDENTITY;
    }
    m.inverse().transpose()
}

/// Rotation of `angle_rad` around the world X axis.
pub fn rotation_x(angle_rad: f32) -> Mat4 {
    Mat4::from_rotation_x(angle_rad)
}

/// Rotation of `angle_rad` around the world Y axis.
pub fn rotation_y(angle_rad: f32) -> Mat4 {
    Mat4::from_rotation_y(angle_rad)
}

pub fn translation(v: Vec3) -> Mat4 {
    Mat4::from_translation(v)
}

pub fn uniform_scale(s: f32) -> Mat4 {
    Mat4::from_scale(Vec3::splat(s))
}

pub fn approx_eq_mat4(a: Mat4, b: Mat4, eps: f32) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= eps)
}
