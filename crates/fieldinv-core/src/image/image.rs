//! Image type with voxel/real geometry.
//!
//! The tensor is stored with the slowest axis first (`[nz, ny, nx]` for 3D,
//! `[ny, nx]` for 2D) so that its row-major host buffer runs x fastest,
//! matching [`Grid::flatten`].

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};

use super::geometry::Geometry;
use super::grid::Grid;
use crate::error::{CoreError, Result};

/// Scalar image with geometry.
///
/// # Type Parameters
/// * `B` - The backend for tensor operations
/// * `D` - The dimensionality of the image (2 or 3)
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    /// Voxel values, slowest axis first.
    data: Tensor<B, D>,
    geometry: Geometry<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    pub fn new(data: Tensor<B, D>, geometry: Geometry<D>) -> Self {
        Self { data, geometry }
    }

    /// Zero image of the given size (x first).
    pub fn zeros(size: [usize; D], geometry: Geometry<D>, device: &B::Device) -> Result<Self> {
        let grid = Grid::new(size)?;
        let data = Tensor::<B, D>::zeros(grid.tensor_dims(), device);
        Ok(Self::new(data, geometry))
    }

    /// Build an image from a host buffer laid out x fastest.
    pub fn from_vec(values: Vec<f32>, size: [usize; D], geometry: Geometry<D>, device: &B::Device) -> Result<Self> {
        let grid = Grid::new(size)?;
        if values.len() != grid.len() {
            return Err(CoreError::shape_mismatch(&[grid.len()], &[values.len()]));
        }
        let data = Tensor::<B, D>::from_data(TensorData::new(values, Shape::new(grid.tensor_dims())), device);
        Ok(Self::new(data, geometry))
    }

    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry<D> {
        &self.geometry
    }

    pub fn device(&self) -> B::Device {
        self.data.device()
    }

    /// Axis sizes, x first.
    pub fn size(&self) -> [usize; D] {
        let mut size = self.data.dims();
        size.reverse();
        size
    }

    pub fn grid(&self) -> Result<Grid<D>> {
        Grid::from_tensor_dims(self.data.dims())
    }

    /// Same geometry, new voxel values.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::new(data, self.geometry)
    }

    /// Read the voxel values back to the host, x fastest.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        self.data
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| CoreError::TensorData(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing3;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_image_creation() {
        let device = Default::default();
        let image = Image::<TestBackend, 3>::zeros([4, 3, 2], Geometry::identity(), &device).unwrap();
        assert_eq!(image.size(), [4, 3, 2]);
        assert_eq!(image.data().dims(), [2, 3, 4]);
        assert_eq!(image.grid().unwrap().len(), 24);
    }

    #[test]
    fn test_host_buffer_is_x_fastest() {
        let device = Default::default();
        let values: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let image = Image::<TestBackend, 2>::from_vec(values.clone(), [4, 3], Geometry::identity(), &device).unwrap();

        // Element (x=1, y=2) lives at tensor position [2, 1].
        let element = image.data().clone().slice([2..3, 1..2]).into_scalar();
        assert_eq!(element, 9.0);
        assert_eq!(image.to_vec().unwrap(), values);
    }

    #[test]
    fn test_from_vec_rejects_wrong_length() {
        let device = Default::default();
        let geometry = Geometry::from_spacing(Spacing3::new(1.0, 1.0, 2.0));
        let result = Image::<TestBackend, 3>::from_vec(vec![0.0; 7], [2, 2, 2], geometry, &device);
        assert!(matches!(result, Err(CoreError::ShapeMismatch { .. })));
    }
}
