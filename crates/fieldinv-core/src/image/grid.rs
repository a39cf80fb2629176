//! Voxel grids with explicit N-D index types.
//!
//! A [`Grid`] stores the size of each axis (x first) and the matching
//! strides. Flattened indices run x fastest, which is also the memory order
//! of the host buffers produced by [`crate::Image::to_vec`].

use crate::error::{CoreError, Result};

/// An integer voxel position, x first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex<const D: usize>(pub [usize; D]);

impl<const D: usize> GridIndex<D> {
    /// Continuous coordinates of this voxel.
    pub fn to_coords(&self) -> [f64; D] {
        let mut coords = [0.0; D];
        for a in 0..D {
            coords[a] = self.0[a] as f64;
        }
        coords
    }
}

/// Fail unless `D` is 2 or 3.
pub fn check_dimension<const D: usize>() -> Result<()> {
    if (2..=3).contains(&D) {
        Ok(())
    } else {
        Err(CoreError::UnsupportedDimension(D))
    }
}

/// Size and strides of a D-dimensional voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid<const D: usize> {
    size: [usize; D],
    strides: [usize; D],
}

impl<const D: usize> Grid<D> {
    /// Create a grid from its size, x first.
    pub fn new(size: [usize; D]) -> Result<Self> {
        check_dimension::<D>()?;
        if size.iter().any(|&n| n == 0) {
            return Err(CoreError::invalid_grid(format!(
                "grid size {:?} has an empty axis",
                size
            )));
        }
        let mut strides = [1usize; D];
        for a in 1..D {
            strides[a] = strides[a - 1] * size[a - 1];
        }
        Ok(Self { size, strides })
    }

    /// Create a grid from tensor dims ordered slowest axis first.
    pub fn from_tensor_dims(dims: [usize; D]) -> Result<Self> {
        let mut size = dims;
        size.reverse();
        Self::new(size)
    }

    /// Axis sizes, x first.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Tensor dims, slowest axis first.
    pub fn tensor_dims(&self) -> [usize; D] {
        let mut dims = self.size;
        dims.reverse();
        dims
    }

    /// Flattened strides, x first.
    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    /// Number of voxels.
    pub fn len(&self) -> usize {
        self.size.iter().product()
    }

    /// Always false for a grid built through [`Grid::new`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the index lies inside the grid.
    pub fn contains(&self, index: &GridIndex<D>) -> bool {
        index.0.iter().zip(self.size.iter()).all(|(&i, &n)| i < n)
    }

    /// Flatten an index into a buffer offset.
    pub fn flatten(&self, index: &GridIndex<D>) -> usize {
        index
            .0
            .iter()
            .zip(self.strides.iter())
            .map(|(&i, &s)| i * s)
            .sum()
    }

    /// Recover the index of a buffer offset.
    pub fn unflatten(&self, offset: usize) -> GridIndex<D> {
        let mut index = [0usize; D];
        let mut rest = offset;
        for a in (0..D).rev() {
            index[a] = rest / self.strides[a];
            rest %= self.strides[a];
        }
        GridIndex(index)
    }

    /// Iterate the indices of the inclusive flattened range `first..=last`.
    pub fn indices(&self, first: usize, last: usize) -> GridIter<D> {
        GridIter {
            size: self.size,
            current: self.unflatten(first),
            remaining: (last + 1).saturating_sub(first),
        }
    }
}

/// Odometer iterator over a flattened range of a grid.
#[derive(Debug, Clone)]
pub struct GridIter<const D: usize> {
    size: [usize; D],
    current: GridIndex<D>,
    remaining: usize,
}

impl<const D: usize> Iterator for GridIter<D> {
    type Item = GridIndex<D>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.current;
        self.remaining -= 1;
        for a in 0..D {
            self.current.0[a] += 1;
            if self.current.0[a] < self.size[a] {
                break;
            }
            self.current.0[a] = 0;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<const D: usize> ExactSizeIterator for GridIter<D> {}
