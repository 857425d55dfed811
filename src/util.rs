use crate::error::CpmError;

pub trait CumsumExt {
  fn cumsum(self) -> impl Iterator<Item = usize>;
}
impl<I: IntoIterator<Item = usize>> CumsumExt for I {
  fn cumsum(self) -> impl Iterator<Item = usize> {
    self.into_iter().scan(0, |acc, x| {
      *acc += x;
      Some(*acc)
    })
  }
}

/// Empirical order of convergence between two refinement levels.
pub fn algebraic_convergence_rate(error_next: f64, error_prev: f64, h_next: f64, h_prev: f64) -> f64 {
  (error_prev / error_next).ln() / (h_prev / h_next).ln()
}

type SparseMatrixFaer = faer::sparse::SparseColMat<usize, f64>;

pub fn nalgebra2faer(m: nas::CscMatrix<f64>) -> SparseMatrixFaer {
  let nrows = m.nrows();
  let ncols = m.ncols();
  let (col_ptrs, row_indices, values) = m.disassemble();

  let symbolic =
    faer::sparse::SymbolicSparseColMat::new_checked(nrows, ncols, col_ptrs, None, row_indices);
  faer::sparse::SparseColMat::new(symbolic, values)
}

/// Sparse LU factorization backing the implicit Euler scheme.
pub struct FaerLu {
  raw: faer::sparse::linalg::solvers::Lu<usize, f64>,
}
impl FaerLu {
  pub fn new(a: &nas::CsrMatrix<f64>) -> Result<Self, CpmError> {
    let raw = nalgebra2faer(nas::CscMatrix::from(a))
      .sp_lu()
      .map_err(|e| CpmError::SolverDivergence(format!("sparse LU factorization failed: {e:?}")))?;
    Ok(Self { raw })
  }

  pub fn solve(&self, b: &na::DVector<f64>) -> na::DVector<f64> {
    use faer::solvers::SpSolver as _;

    let b = faer::col::from_slice(b.as_slice());
    na::DVector::from_vec(self.raw.solve(b).as_slice().to_vec())
  }
}
