//! Fallible allocation of working buffers.

use crate::error::{InversionError, Result};

/// Allocate `len` copies of `value`, reporting allocation failure as an error.
pub fn try_filled<T: Clone>(len: usize, value: T, what: &str) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        InversionError::allocation(format!("{} ({} elements): {}", what, len, e))
    })?;
    buffer.resize(len, value);
    Ok(buffer)
}
