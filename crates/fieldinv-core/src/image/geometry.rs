//! Voxel/real geometry of an image.
//!
//! A [`Geometry`] holds the voxel→real homogeneous matrix, its inverse and a
//! [`GeometryClass`] that selects fast-path arithmetic:
//!
//! * **Homothety**: diagonal scaling only.
//! * **Translation**: diagonal scaling plus an offset.
//! * **Qform**: a full affine matrix, e.g. an oblique acquisition.
//! * **Unknown**: no classification; point arithmetic uses the full matrix and
//!   unit conversion refuses it.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::spatial::{embed, Direction, Homogeneous, Point, Spacing, Vector};

const CLASSIFY_EPSILON: f64 = 1e-9;

/// Classification of a voxel↔real matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryClass {
    Unknown,
    Homothety,
    Translation,
    Qform,
}

impl GeometryClass {
    fn rank(self) -> u8 {
        match self {
            GeometryClass::Unknown | GeometryClass::Homothety => 0,
            GeometryClass::Translation => 1,
            GeometryClass::Qform => 2,
        }
    }

    /// The more general of two classes, with `Unknown` read as `Homothety`.
    ///
    /// Used for products such as `H_flo⁻¹·H_ref` whose structure is bounded by
    /// the least structured factor.
    pub fn combine(self, other: GeometryClass) -> GeometryClass {
        let a = if self == GeometryClass::Unknown { GeometryClass::Homothety } else { self };
        let b = if other == GeometryClass::Unknown { GeometryClass::Homothety } else { other };
        if a.rank() >= b.rank() {
            a
        } else {
            b
        }
    }

    pub fn is_known(self) -> bool {
        self != GeometryClass::Unknown
    }
}

/// Voxel↔real mapping of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry<const D: usize> {
    spacing: Spacing<D>,
    to_real: Homogeneous,
    to_voxel: Homogeneous,
    class: GeometryClass,
}

impl<const D: usize> Geometry<D> {
    /// Unit spacing, zero origin, identity orientation.
    pub fn identity() -> Self {
        Self::from_spacing(Spacing::<D>::repeat(1.0))
    }

    /// Pure scaling geometry.
    pub fn from_spacing(spacing: Spacing<D>) -> Self {
        let mut to_real = Homogeneous::identity();
        let mut to_voxel = Homogeneous::identity();
        for a in 0..D {
            to_real[(a, a)] = spacing[a];
            to_voxel[(a, a)] = 1.0 / spacing[a];
        }
        Self {
            spacing,
            to_real,
            to_voxel,
            class: GeometryClass::Homothety,
        }
    }

    /// Build a geometry from an origin, spacing and direction matrix and
    /// classify it.
    ///
    /// `point = origin + direction · (spacing ⊙ index)`
    pub fn from_metadata(origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Result<Self> {
        if spacing.iter().any(|&s| !(s > 0.0) || !s.is_finite()) {
            return Err(CoreError::singular_matrix(format!(
                "spacing {:?} must be positive",
                spacing.as_slice()
            )));
        }
        let linear = direction * Direction::<D>::from_diagonal(&spacing);
        let to_real = embed(&linear, &origin.coords);
        let to_voxel = to_real
            .try_inverse()
            .ok_or_else(|| CoreError::singular_matrix("voxel to real matrix is not invertible"))?;

        let identity_direction = (direction - Direction::<D>::identity()).amax() < CLASSIFY_EPSILON;
        let zero_origin = origin.coords.amax() < CLASSIFY_EPSILON;
        let class = match (identity_direction, zero_origin) {
            (true, true) => GeometryClass::Homothety,
            (true, false) => GeometryClass::Translation,
            (false, _) => GeometryClass::Qform,
        };

        Ok(Self {
            spacing,
            to_real,
            to_voxel,
            class,
        })
    }

    /// Build a geometry from an arbitrary voxel→real matrix.
    ///
    /// The class is `Unknown`; use [`Geometry::with_class`] when the caller
    /// knows the structure of the matrix.
    pub fn from_matrix(to_real: Homogeneous) -> Result<Self> {
        let to_voxel = to_real
            .try_inverse()
            .ok_or_else(|| CoreError::singular_matrix("voxel to real matrix is not invertible"))?;
        let spacing = Spacing::<D>::from_fn(|a, _| {
            (0..D).map(|r| to_real[(r, a)] * to_real[(r, a)]).sum::<f64>().sqrt()
        });
        Ok(Self {
            spacing,
            to_real,
            to_voxel,
            class: GeometryClass::Unknown,
        })
    }

    pub fn with_class(mut self, class: GeometryClass) -> Self {
        self.class = class;
        self
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Voxel→real homogeneous matrix.
    pub fn to_real(&self) -> &Homogeneous {
        &self.to_real
    }

    /// Real→voxel homogeneous matrix.
    pub fn to_voxel(&self) -> &Homogeneous {
        &self.to_voxel
    }

    pub fn class(&self) -> GeometryClass {
        self.class
    }

    /// Map a voxel coordinate to a real point.
    pub fn voxel_to_real_point(&self, index: &[f64; D]) -> [f64; D] {
        apply_point(&self.to_real, self.class, index)
    }

    /// Map a real point to a continuous voxel coordinate.
    pub fn real_to_voxel_point(&self, point: &[f64; D]) -> [f64; D] {
        apply_point(&self.to_voxel, self.class, point)
    }

    /// Express a voxel-unit vector in real units.
    pub fn voxel_to_real_vector(&self, v: &[f64; D]) -> [f64; D] {
        apply_linear(&self.to_real, self.class, v)
    }

    /// Express a real-unit vector in voxel units.
    pub fn real_to_voxel_vector(&self, v: &[f64; D]) -> [f64; D] {
        apply_linear(&self.to_voxel, self.class, v)
    }

    /// Origin of the image, the real point of voxel zero.
    pub fn origin(&self) -> Vector<D> {
        Vector::<D>::from_fn(|r, _| self.to_real[(r, 3)])
    }
}

impl<const D: usize> Default for Geometry<D> {
    fn default() -> Self {
        Self::identity()
    }
}

/// Apply a homogeneous matrix to a point with the fast path of `class`.
pub fn apply_point<const D: usize>(m: &Homogeneous, class: GeometryClass, p: &[f64; D]) -> [f64; D] {
    let mut out = [0.0; D];
    match class {
        GeometryClass::Homothety => {
            for r in 0..D {
                out[r] = m[(r, r)] * p[r];
            }
        }
        GeometryClass::Translation => {
            for r in 0..D {
                out[r] = m[(r, r)] * p[r] + m[(r, 3)];
            }
        }
        GeometryClass::Qform | GeometryClass::Unknown => {
            for r in 0..D {
                let mut acc = m[(r, 3)];
                for c in 0..D {
                    acc += m[(r, c)] * p[c];
                }
                out[r] = acc;
            }
        }
    }
    out
}

/// Apply the linear part of a homogeneous matrix with the fast path of `class`.
pub fn apply_linear<const D: usize>(m: &Homogeneous, class: GeometryClass, v: &[f64; D]) -> [f64; D] {
    let mut out = [0.0; D];
    match class {
        GeometryClass::Homothety | GeometryClass::Translation => {
            for r in 0..D {
                out[r] = m[(r, r)] * v[r];
            }
        }
        GeometryClass::Qform | GeometryClass::Unknown => {
            for r in 0..D {
                let mut acc = 0.0;
                for c in 0..D {
                    acc += m[(r, c)] * v[c];
                }
                out[r] = acc;
            }
        }
    }
    out
}
