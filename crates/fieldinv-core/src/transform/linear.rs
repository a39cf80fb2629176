//! Linear transformations with closed-form inverses.
//!
//! A linear transformation is stored as a homogeneous 4×4 matrix together
//! with the kind it was built as. The kind selects the inverse formula:
//!
//! * translation: `t → −t`
//! * translation + scaling: `s → 1/s`, `t → −t/s`
//! * rigid: `R → Rᵀ`, `t → −Rᵀt`
//! * similitude and affine: general 4×4 inverse

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::trait_::{map_points, Transform};
use super::transformation::Unit;
use crate::error::{CoreError, Result};
use crate::image::geometry::{apply_point, GeometryClass};
use crate::spatial::{embed, linear_part, translation_part, Direction, Direction2, Direction3, Homogeneous, Vector};

const KIND_EPSILON: f64 = 1e-9;

/// Structure of a linear transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinearKind {
    Translation,
    TranslationScaling,
    Rigid,
    Similitude,
    Affine,
}

impl LinearKind {
    /// Most structured kind whose closed-form inverse holds for `linear`.
    pub fn classify<const D: usize>(linear: &Direction<D>) -> LinearKind {
        let identity = Direction::<D>::identity();
        let tolerance = KIND_EPSILON * linear.amax().max(1.0);
        let diagonal = Direction::<D>::from_diagonal(&linear.diagonal());
        if (linear - diagonal).amax() < tolerance {
            return if (linear - identity).amax() < tolerance {
                LinearKind::Translation
            } else {
                LinearKind::TranslationScaling
            };
        }

        let gram = linear.transpose() * linear;
        let gram_tolerance = KIND_EPSILON * gram.amax().max(1.0);
        let scale2 = gram.trace() / D as f64;
        if (gram - identity * scale2).amax() >= gram_tolerance {
            LinearKind::Affine
        } else if (scale2 - 1.0).abs() < gram_tolerance {
            LinearKind::Rigid
        } else {
            LinearKind::Similitude
        }
    }

    /// Kind of `a ∘ b`.
    pub fn compose(self, other: LinearKind) -> LinearKind {
        use LinearKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Translation, b) => b,
            (a, Translation) => a,
            (Rigid, Similitude) | (Similitude, Rigid) => Similitude,
            _ => Affine,
        }
    }
}

/// Linear transformation in homogeneous form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTransform<const D: usize> {
    kind: LinearKind,
    matrix: Homogeneous,
    unit: Unit,
}

impl<const D: usize> LinearTransform<D> {
    /// Wrap a homogeneous matrix. For 2D the z row and column are reset to
    /// the identity.
    pub fn new(kind: LinearKind, matrix: Homogeneous, unit: Unit) -> Self {
        let matrix = embed::<D>(&linear_part(&matrix), &translation_part(&matrix));
        Self { kind, matrix, unit }
    }

    pub fn identity() -> Self {
        Self::new(LinearKind::Translation, Homogeneous::identity(), Unit::Real)
    }

    pub fn translation(t: Vector<D>) -> Self {
        Self::new(LinearKind::Translation, embed(&Direction::<D>::identity(), &t), Unit::Real)
    }

    pub fn translation_scaling(scale: Vector<D>, t: Vector<D>) -> Self {
        Self::new(
            LinearKind::TranslationScaling,
            embed(&Direction::<D>::from_diagonal(&scale), &t),
            Unit::Real,
        )
    }

    /// `rotation` must be orthonormal.
    pub fn rigid(rotation: Direction<D>, t: Vector<D>) -> Self {
        Self::new(LinearKind::Rigid, embed(&rotation, &t), Unit::Real)
    }

    pub fn similitude(scale: f64, rotation: Direction<D>, t: Vector<D>) -> Self {
        Self::new(LinearKind::Similitude, embed(&(rotation * scale), &t), Unit::Real)
    }

    pub fn affine(linear: Direction<D>, t: Vector<D>) -> Self {
        Self::new(LinearKind::Affine, embed(&linear, &t), Unit::Real)
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn kind(&self) -> LinearKind {
        self.kind
    }

    pub fn matrix(&self) -> &Homogeneous {
        &self.matrix
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn transform_point(&self, p: &[f64; D]) -> [f64; D] {
        apply_point(&self.matrix, GeometryClass::Qform, p)
    }

    /// `self ∘ other`: apply `other` first.
    pub fn compose(&self, other: &LinearTransform<D>) -> Result<Self> {
        if self.unit != other.unit {
            return Err(CoreError::unit_mismatch(format!(
                "cannot compose {:?} and {:?} transformations",
                self.unit, other.unit
            )));
        }
        Ok(Self::new(self.kind.compose(other.kind), self.matrix * other.matrix, self.unit))
    }

    /// Closed-form inverse; the unit is carried over.
    pub fn inverse(&self) -> Result<Self> {
        let linear = linear_part::<D>(&self.matrix);
        let t = translation_part::<D>(&self.matrix);

        let matrix = match self.kind {
            LinearKind::Translation => embed(&Direction::<D>::identity(), &(-t)),
            LinearKind::TranslationScaling => {
                let scale = linear.diagonal();
                if scale.iter().any(|&s| s == 0.0 || !s.is_finite()) {
                    return Err(CoreError::singular_matrix(format!(
                        "scaling {:?} is not invertible",
                        scale.as_slice()
                    )));
                }
                let inv_scale = scale.map(|s| 1.0 / s);
                embed(&Direction::<D>::from_diagonal(&inv_scale), &(-t.component_mul(&inv_scale)))
            }
            LinearKind::Rigid => {
                let rt = linear.transpose();
                embed(&rt, &(-(rt * t)))
            }
            LinearKind::Similitude | LinearKind::Affine => self
                .matrix
                .try_inverse()
                .ok_or_else(|| CoreError::singular_matrix(format!("{:?} matrix is not invertible", self.kind)))?,
        };

        Ok(Self::new(self.kind, matrix, self.unit))
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for LinearTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        map_points(points, |p| self.transform_point(p))
    }
}

/// Counter-clockwise rotation by `theta` radians.
pub fn rotation_2d(theta: f64) -> Direction2 {
    let (s, c) = theta.sin_cos();
    Direction2::new(c, -s, s, c)
}

/// Rotation `Rx · Ry · Rz` from Euler angles in radians.
pub fn rotation_3d(angle_x: f64, angle_y: f64, angle_z: f64) -> Direction3 {
    let (sx, cx) = angle_x.sin_cos();
    let (sy, cy) = angle_y.sin_cos();
    let (sz, cz) = angle_z.sin_cos();

    let rz = Direction3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0);
    let ry = Direction3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy);
    let rx = Direction3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx);
    rx * ry * rz
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Vector2, Vector3};

    fn assert_identity(m: &Homogeneous, tol: f64) {
        let diff = (m - Homogeneous::identity()).amax();
        assert!(diff < tol, "not an identity (max deviation {}):\n{}", diff, m);
    }

    #[test]
    fn test_translation_inverse() {
        let t = LinearTransform::<3>::translation(Vector3::new(1.0, -2.0, 3.5));
        let inv = t.inverse().unwrap();
        assert_eq!(inv.kind(), LinearKind::Translation);
        assert_eq!(inv.matrix()[(1, 3)], 2.0);
        assert_identity(t.compose(&inv).unwrap().matrix(), 1e-12);
    }

    #[test]
    fn test_rigid_2d_inverse_composes_to_identity() {
        let t = LinearTransform::<2>::rigid(rotation_2d(0.8), Vector2::new(3.0, -1.5));
        let inv = t.inverse().unwrap();
        let composed = t.compose(&inv).unwrap();
        assert_identity(composed.matrix(), 1e-6);
        assert_eq!(composed.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_scaling_inverse() {
        let t = LinearTransform::<2>::translation_scaling(Vector2::new(2.0, 0.5), Vector2::new(4.0, 1.0));
        let inv = t.inverse().unwrap();
        let p = inv.transform_point(&t.transform_point(&[1.0, 2.0]));
        assert!((p[0] - 1.0).abs() < 1e-12 && (p[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_affine_is_rejected() {
        let t = LinearTransform::<2>::affine(Direction2::new(1.0, 2.0, 2.0, 4.0), Vector2::zeros());
        assert!(matches!(t.inverse(), Err(CoreError::SingularMatrix(_))));
    }

    #[test]
    fn test_inverse_keeps_unit() {
        let t = LinearTransform::<3>::similitude(2.0, rotation_3d(0.1, 0.2, 0.3), Vector3::new(1.0, 1.0, 1.0))
            .with_unit(Unit::Voxel);
        assert_eq!(t.inverse().unwrap().unit(), Unit::Voxel);
    }

    #[test]
    fn test_compose_rejects_mixed_units() {
        let a = LinearTransform::<2>::identity();
        let b = LinearTransform::<2>::identity().with_unit(Unit::Voxel);
        assert!(matches!(a.compose(&b), Err(CoreError::UnitMismatch(_))));
    }

    #[test]
    fn test_classify_linear_parts() {
        use LinearKind::*;
        assert_eq!(LinearKind::classify(&Direction2::identity()), Translation);
        assert_eq!(LinearKind::classify(&Direction2::new(2.0, 0.0, 0.0, 2.0)), TranslationScaling);
        assert_eq!(LinearKind::classify(&rotation_2d(0.4)), Rigid);
        assert_eq!(LinearKind::classify(&(rotation_2d(0.4) * 3.0)), Similitude);
        assert_eq!(LinearKind::classify(&Direction2::new(1.0, 0.5, 0.0, 1.0)), Affine);
        assert_eq!(LinearKind::classify(&(rotation_3d(0.1, 0.2, 0.3) * 0.5)), Similitude);
    }

    #[test]
    fn test_kind_composition() {
        use LinearKind::*;
        assert_eq!(Translation.compose(Rigid), Rigid);
        assert_eq!(Rigid.compose(Similitude), Similitude);
        assert_eq!(TranslationScaling.compose(Rigid), Affine);
    }
}
