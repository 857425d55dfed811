//! Triplet-based sparse matrix builder used by all operator assembly.

/// Accumulator for matrix entries in coordinate form.
///
/// Assembly pushes triplets (possibly duplicated, they sum up on
/// conversion) and converts to CSR once the operator is complete.
/// Operators are immutable after that conversion.
#[derive(Default, Debug, Clone)]
pub struct SparseMatrix {
  nrows: usize,
  ncols: usize,
  triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrix {
  pub fn zeros(nrows: usize, ncols: usize) -> Self {
    Self::new(nrows, ncols, Vec::new())
  }
  pub fn new(nrows: usize, ncols: usize, triplets: Vec<(usize, usize, f64)>) -> Self {
    Self {
      nrows,
      ncols,
      triplets,
    }
  }

  pub fn nrows(&self) -> usize {
    self.nrows
  }
  pub fn ncols(&self) -> usize {
    self.ncols
  }
  pub fn triplets(&self) -> &[(usize, usize, f64)] {
    &self.triplets
  }

  pub fn push(&mut self, r: usize, c: usize, v: f64) {
    assert!(r < self.nrows && c < self.ncols);
    if v != 0.0 {
      self.triplets.push((r, c, v));
    }
  }

  pub fn extend(&mut self, triplets: impl IntoIterator<Item = (usize, usize, f64)>) {
    for (r, c, v) in triplets {
      self.push(r, c, v);
    }
  }

  pub fn to_nalgebra_coo(&self) -> nas::CooMatrix<f64> {
    let rows = self.triplets.iter().map(|t| t.0).collect();
    let cols = self.triplets.iter().map(|t| t.1).collect();
    let vals = self.triplets.iter().map(|t| t.2).collect();
    nas::CooMatrix::try_from_triplets(self.nrows, self.ncols, rows, cols, vals).unwrap()
  }

  pub fn to_nalgebra_csr(&self) -> nas::CsrMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }
}

/// CSR identity, used by the stabilized evolution operators.
pub fn identity(n: usize) -> nas::CsrMatrix<f64> {
  nas::CsrMatrix::identity(n)
}

/// Scale every stored entry. Cheaper than going through a scalar
/// matrix product and keeps the sparsity pattern untouched.
pub fn scaled(mut m: nas::CsrMatrix<f64>, s: f64) -> nas::CsrMatrix<f64> {
  for v in m.values_mut() {
    *v *= s;
  }
  m
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn triplets_sum_into_csr() {
    let mut m = SparseMatrix::zeros(2, 2);
    m.push(0, 0, 1.0);
    m.push(0, 0, 2.0);
    m.push(1, 0, -1.0);
    let csr = m.to_nalgebra_csr();
    assert_eq!(csr.nnz(), 2);
    assert_eq!(csr.get_entry(0, 0).unwrap().into_value(), 3.0);
    assert_eq!(csr.get_entry(1, 0).unwrap().into_value(), -1.0);
  }

  #[test]
  fn scaling_preserves_pattern() {
    let mut m = SparseMatrix::zeros(2, 2);
    m.push(0, 1, 2.0);
    m.push(1, 1, 4.0);
    let csr = scaled(m.to_nalgebra_csr(), 0.5);
    assert_eq!(csr.nnz(), 2);
    assert_eq!(csr.get_entry(0, 1).unwrap().into_value(), 1.0);
    assert_eq!(csr.get_entry(1, 1).unwrap().into_value(), 2.0);
  }
}
