use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::displacement_field::DisplacementField;
use super::linear::LinearTransform;
use super::trait_::Transform;
use crate::error::Result;

/// Unit in which displacements and translations are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Grid-cell units.
    Voxel,
    /// Physical units, e.g. millimetres.
    Real,
}

/// A linear or dense transformation.
#[derive(Debug, Clone)]
pub enum Transformation<B: Backend, const D: usize> {
    Linear(LinearTransform<D>),
    VectorField(DisplacementField<B, D>),
}

impl<B: Backend, const D: usize> Transformation<B, D> {
    pub fn unit(&self) -> Unit {
        match self {
            Transformation::Linear(t) => t.unit(),
            Transformation::VectorField(f) => f.unit(),
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Transformation::Linear(_))
    }

    pub fn as_linear(&self) -> Option<&LinearTransform<D>> {
        match self {
            Transformation::Linear(t) => Some(t),
            Transformation::VectorField(_) => None,
        }
    }

    pub fn as_vector_field(&self) -> Option<&DisplacementField<B, D>> {
        match self {
            Transformation::Linear(_) => None,
            Transformation::VectorField(f) => Some(f),
        }
    }

    /// Short name used in logs and error messages.
    pub fn type_name(&self) -> String {
        match self {
            Transformation::Linear(t) => format!("{:?} {}D", t.kind(), D),
            Transformation::VectorField(_) => format!("vector field {}D", D),
        }
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for Transformation<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        match self {
            Transformation::Linear(t) => t.transform_points(points),
            Transformation::VectorField(f) => f.transform_points(points),
        }
    }
}

impl<B: Backend, const D: usize> From<LinearTransform<D>> for Transformation<B, D> {
    fn from(t: LinearTransform<D>) -> Self {
        Transformation::Linear(t)
    }
}

impl<B: Backend, const D: usize> From<DisplacementField<B, D>> for Transformation<B, D> {
    fn from(f: DisplacementField<B, D>) -> Self {
        Transformation::VectorField(f)
    }
}
