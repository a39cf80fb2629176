//! Transform trait for spatial coordinate transformations.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use crate::error::{CoreError, Result};

/// Transform trait for spatial coordinate transformations.
///
/// Points are expressed in the unit of the transformation: continuous voxel
/// indices for VOXEL transformations, physical coordinates for REAL ones.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transform<B: Backend, const D: usize> {
    /// Apply the transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]`, x first
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>>;
}

/// Map every row of a `[Batch, D]` tensor through `f` on the host.
pub(crate) fn map_points<B, const D: usize, F>(points: Tensor<B, 2>, f: F) -> Result<Tensor<B, 2>>
where
    B: Backend,
    F: Fn(&[f64; D]) -> [f64; D],
{
    let [batch, rank] = points.dims();
    if rank != D {
        return Err(CoreError::shape_mismatch(&[batch, D], &[batch, rank]));
    }
    let device = points.device();
    let values = points
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| CoreError::TensorData(format!("{:?}", e)))?;

    let mut out = Vec::with_capacity(values.len());
    for row in values.chunks_exact(D) {
        let mut p = [0.0; D];
        p.copy_from_slice(row);
        out.extend(f(&p).iter().map(|&v| v as f32));
    }
    Ok(Tensor::from_data(TensorData::new(out, Shape::new([batch, D])), &device))
}
