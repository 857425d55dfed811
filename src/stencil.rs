//! Finite-difference stencils over the virtual grid.

use crate::{band::GridIdx, error::CpmError};

/// A set of integer grid offsets with weights, plus a diagonal weight
/// for the center point.
#[derive(Debug, Clone)]
pub struct Stencil {
  dim: usize,
  offsets: Vec<GridIdx>,
  weights: Vec<f64>,
  diagonal: f64,
}

impl Stencil {
  pub fn new(
    dim: usize,
    offsets: Vec<GridIdx>,
    weights: Vec<f64>,
    diagonal: f64,
  ) -> Result<Self, CpmError> {
    if offsets.len() != weights.len() {
      return Err(CpmError::config(format!(
        "{} offsets but {} weights",
        offsets.len(),
        weights.len()
      )));
    }
    if dim < 3 && offsets.iter().any(|o| o[dim..].iter().any(|&c| c != 0)) {
      return Err(CpmError::config(format!(
        "stencil offset uses axes beyond dimension {dim}"
      )));
    }
    Ok(Self {
      dim,
      offsets,
      weights,
      diagonal,
    })
  }

  /// Second-order Laplacian: `1/dx^2` per axis neighbor and
  /// `-2 d / dx^2` on the diagonal.
  pub fn laplacian(dim: usize, dx: f64) -> Result<Self, CpmError> {
    let idx2 = 1.0 / (dx * dx);
    let offsets: Vec<GridIdx> = match dim {
      2 => vec![[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0]],
      3 => vec![
        [1, 0, 0],
        [-1, 0, 0],
        [0, 1, 0],
        [0, -1, 0],
        [0, 0, 1],
        [0, 0, -1],
      ],
      _ => {
        return Err(CpmError::config(format!(
          "no Laplacian stencil for dimension {dim}"
        )))
      }
    };
    let weights = vec![idx2; offsets.len()];
    Self::new(dim, offsets, weights, -2.0 * dim as f64 * idx2)
  }

  pub fn dim(&self) -> usize {
    self.dim
  }
  pub fn diagonal(&self) -> f64 {
    self.diagonal
  }
  pub fn entries(&self) -> impl Iterator<Item = (GridIdx, f64)> + '_ {
    self.offsets.iter().copied().zip(self.weights.iter().copied())
  }

  /// Largest offset magnitude along any axis.
  pub fn arm(&self) -> i64 {
    self
      .offsets
      .iter()
      .flat_map(|o| o.iter().map(|c| c.abs()))
      .max()
      .unwrap_or(0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn laplacian_weights_sum_to_zero() {
    for dim in [2, 3] {
      let stencil = Stencil::laplacian(dim, 0.1).unwrap();
      let sum: f64 = stencil.entries().map(|(_, w)| w).sum::<f64>() + stencil.diagonal();
      assert!(sum.abs() < 1e-10);
    }
  }

  #[test]
  fn unsupported_dimension_is_rejected() {
    assert!(Stencil::laplacian(1, 0.1).is_err());
    assert!(Stencil::laplacian(4, 0.1).is_err());
  }

  #[test]
  fn offsets_outside_dimension_are_rejected() {
    let bad = Stencil::new(2, vec![[0, 0, 1]], vec![1.0], 0.0);
    assert!(bad.is_err());
  }
}
