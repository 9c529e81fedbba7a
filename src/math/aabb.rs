use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Axis aligned bounding box.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box that any union will overwrite.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |acc, p| Self {
            min: acc.min.min(*p),
            max: acc.max.max(*p),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Corners ordered by bit pattern: bit 0 = x, bit 1 = y, bit 2 = z (set = max).
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            )
        })
    }

    /// Box enclosing all eight corners after transformation.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = self.corners().map(|c| transform.transform_point3(c));
        Self::from_points(corners.iter())
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_points_and_union() {
        let a = Aabb::from_points(&[Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 0.5)]);
        assert_eq!(a, Aabb::new(Vec3::new(-1.0, -2.0, 0.0), Vec3::new(1.0, 3.0, 0.5)));

        let b = Aabb::new(Vec3::splat(2.0), Vec3::splat(4.0));
        let u = a.union(&b);
        assert_eq!(u, Aabb::new(Vec3::new(-1.0, -2.0, 0.0), Vec3::new(4.0, 4.0, 4.0)));
    }

    #[test]
    fn empty_box_is_union_identity() {
        assert!(Aabb::EMPTY.is_empty());
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(Aabb::EMPTY.union(&b), b);
        assert!(Aabb::from_points(&[] as &[Vec3]).is_empty());
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rot = Mat4::from_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let t = b.transformed(&rot);
        let r = std::f32::consts::SQRT_2;
        assert!((t.max.x - r).abs() < 1e-5);
        assert!((t.min.y + r).abs() < 1e-5);
        assert!((t.max.z - 1.0).abs() < 1e-5);
    }
}
