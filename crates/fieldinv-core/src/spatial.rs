//! Spatial types for points, vectors, spacing and orientation.
//!
//! All types are nalgebra aliases in `f64`. Component 0 is always the x axis.

use nalgebra::{Matrix4, Point as NaPoint, SMatrix, SVector};

pub type Point<const D: usize> = NaPoint<f64, D>;
pub type Vector<const D: usize> = SVector<f64, D>;
pub type Spacing<const D: usize> = SVector<f64, D>;
pub type Direction<const D: usize> = SMatrix<f64, D, D>;

/// Homogeneous 4×4 matrix shared by 2D and 3D geometries.
///
/// For 2D data the z row and column are the identity.
pub type Homogeneous = Matrix4<f64>;

pub type Point2 = Point<2>;
pub type Point3 = Point<3>;
pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Spacing2 = Spacing<2>;
pub type Spacing3 = Spacing<3>;
pub type Direction2 = Direction<2>;
pub type Direction3 = Direction<3>;

/// Embed a D×D linear part and a translation into a homogeneous matrix.
pub fn embed<const D: usize>(linear: &Direction<D>, translation: &Vector<D>) -> Homogeneous {
    let mut m = Homogeneous::identity();
    for r in 0..D {
        for c in 0..D {
            m[(r, c)] = linear[(r, c)];
        }
        m[(r, 3)] = translation[r];
    }
    m
}

/// Extract the D×D linear part of a homogeneous matrix.
pub fn linear_part<const D: usize>(m: &Homogeneous) -> Direction<D> {
    Direction::<D>::from_fn(|r, c| m[(r, c)])
}

/// Extract the translation column of a homogeneous matrix.
pub fn translation_part<const D: usize>(m: &Homogeneous) -> Vector<D> {
    Vector::<D>::from_fn(|r, _| m[(r, 3)])
}
