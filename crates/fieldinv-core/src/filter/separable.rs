use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Shape, Tensor};

use crate::image::Image;

/// Operation applied along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Leave the axis untouched.
    None,
    /// Gaussian smoothing.
    Smooth,
    /// Gaussian-weighted first derivative.
    FirstDerivative,
}

/// Separable Gaussian smoothing / derivative filter.
///
/// Each axis is filtered with its own 1D kernel through burn's `conv1d`.
/// Sigmas are expressed in voxels. Borders replicate the edge voxel, so a
/// constant image has a zero derivative everywhere.
///
/// The derivative kernel is normalised so that a linear ramp of slope one
/// yields exactly one away from the borders. With a sigma of zero it reduces
/// to the central difference `(f(x+1) − f(x−1)) / 2`.
pub struct SeparableFilter<B: Backend> {
    max_kernel_width: usize,
    _b: std::marker::PhantomData<B>,
}

impl<B: Backend> Default for SeparableFilter<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> SeparableFilter<B> {
    pub fn new() -> Self {
        Self {
            max_kernel_width: 31,
            _b: std::marker::PhantomData,
        }
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(3);
        self
    }

    /// Smooth along every axis.
    pub fn smooth<const D: usize>(&self, image: &Image<B, D>, sigma: f64) -> Image<B, D> {
        self.apply(image, [FilterOp::Smooth; D], sigma)
    }

    /// Differentiate along `axis` (x = 0) and smooth along the others.
    pub fn derivative<const D: usize>(&self, image: &Image<B, D>, axis: usize, sigma: f64) -> Image<B, D> {
        let mut ops = [FilterOp::Smooth; D];
        ops[axis] = FilterOp::FirstDerivative;
        self.apply(image, ops, sigma)
    }

    /// Apply one operation per axis, x first.
    pub fn apply<const D: usize>(&self, image: &Image<B, D>, ops: [FilterOp; D], sigma: f64) -> Image<B, D> {
        let mut data = image.data().clone();
        let device = data.device();

        for (axis, op) in ops.iter().enumerate() {
            let Some(kernel) = self.generate_kernel(*op, sigma) else {
                continue;
            };
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &device);
            // Tensor dims are slowest axis first.
            data = self.convolve_1d::<D>(data, kernel_tensor, D - 1 - axis);
        }

        image.with_data(data)
    }

    fn generate_kernel(&self, op: FilterOp, sigma: f64) -> Option<Vec<f32>> {
        let radius = ((3.0 * sigma).ceil() as usize).min((self.max_kernel_width - 1) / 2);
        match op {
            FilterOp::None => None,
            FilterOp::Smooth if sigma <= 1e-6 || radius == 0 => None,
            FilterOp::FirstDerivative if sigma <= 1e-6 || radius == 0 => Some(vec![-0.5, 0.0, 0.5]),
            FilterOp::Smooth => {
                let weights = gaussian_weights(sigma, radius);
                let sum: f64 = weights.iter().sum();
                Some(weights.iter().map(|w| (w / sum) as f32).collect())
            }
            FilterOp::FirstDerivative => {
                let weights = gaussian_weights(sigma, radius);
                // sum_j j² g(j) makes the response to f(x) = x equal to one
                let norm: f64 = weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| {
                        let j = i as f64 - radius as f64;
                        j * j * w
                    })
                    .sum();
                if norm < 1e-12 {
                    return Some(vec![-0.5, 0.0, 0.5]);
                }
                Some(
                    weights
                        .iter()
                        .enumerate()
                        .map(|(i, w)| ((i as f64 - radius as f64) * w / norm) as f32)
                        .collect(),
                )
            }
        }
    }

    fn convolve_1d<const D: usize>(&self, input: Tensor<B, D>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, D> {
        let dims: [usize; D] = input.dims();

        // 1. Permute target dimension to the last
        let mut permute_indices = [0isize; D];
        let mut idx = 0;
        for i in 0..D {
            if i != dim {
                permute_indices[idx] = i as isize;
                idx += 1;
            }
        }
        permute_indices[D - 1] = dim as isize;

        // 2. Flatten other dimensions into batch: [Batch, 1, Length]
        let length = dims[dim];
        let batch_size: usize = (0..D).filter(|&i| i != dim).map(|i| dims[i]).product();
        let signal = input.permute(permute_indices).reshape([batch_size, 1, length]);

        // 3. Replicate the edge voxels
        let kernel_size = kernel.dims()[0];
        let radius = kernel_size / 2;
        let first = signal.clone().slice([0..batch_size, 0..1, 0..1]);
        let last = signal.clone().slice([0..batch_size, 0..1, length - 1..length]);
        let mut parts = Vec::with_capacity(2 * radius + 1);
        parts.extend(std::iter::repeat(first).take(radius));
        parts.push(signal);
        parts.extend(std::iter::repeat(last).take(radius));
        let padded = Tensor::cat(parts, 2);

        let options = ConvOptions::new([1], [0], [1], 1);
        let output = burn::tensor::module::conv1d(padded, kernel.reshape([1, 1, kernel_size]), None, options);

        // 4. Reshape back and inverse permute
        let mut permuted_shape = [0usize; D];
        for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
            permuted_shape[new_pos] = dims[old_pos as usize];
        }
        let output = output.reshape(Shape::new(permuted_shape));

        let mut inv_permute_indices = [0isize; D];
        for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
            inv_permute_indices[old_pos as usize] = new_pos as isize;
        }
        output.permute(inv_permute_indices)
    }
}

fn gaussian_weights(sigma: f64, radius: usize) -> Vec<f64> {
    let two_sigma2 = 2.0 * sigma * sigma;
    (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect()
}
