use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Translation/rotation/scale triple.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub t: Vec3,
    pub r: Quat,
    pub s: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        t: Vec3::ZERO,
        r: Quat::IDENTITY,
        s: Vec3::ONE,
    };

    pub fn from_translation(t: Vec3) -> Self {
        Self { t, ..Self::IDENTITY }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.s, self.r, self.t)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inverse transpose of the upper 3x3, for transforming normals.
pub fn normal_matrix(m: &Mat4) -> Mat3 {
    let m3 = Mat3::from_mat4(*m);
    let det = m3.determinant();
    if det == 0.0 || !det.is_finite() {
        // collapsed instance, normals are irrelevant
        return Mat3::ZERO;
    }
    m3.inverse().transpose()
}
