//! Assembly of the discrete Laplacian and closest-point extension
//! operators over a band.

use rayon::prelude::*;

use crate::{
  band::{Band, Field},
  error::CpmError,
  sparse::SparseMatrix,
  stencil::Stencil,
};

/// Assemble the difference operator defined by `stencil` over the band.
///
/// Rows are band points. Interior rows accumulate the full stencil;
/// rows on the outer rim are left zero, since the extension step never
/// reads values there. A missing neighbor of an *interior* row means
/// the band was built narrower than the stencil needs.
pub fn build_diff_matrix(band: &Band, stencil: &Stencil) -> Result<nas::CsrMatrix<f64>, CpmError> {
  if stencil.dim() != band.dim() {
    return Err(CpmError::config(format!(
      "stencil dimension {} does not match band dimension {}",
      stencil.dim(),
      band.dim()
    )));
  }

  let part = band.partition();
  let n = band.len();

  let local: Vec<Vec<(usize, usize, f64)>> = (0..part.nworkers())
    .into_par_iter()
    .map(|rank| {
      let mut triplets = Vec::new();
      for row in part.local_range(rank) {
        if !band.is_interior(row) {
          continue;
        }
        triplets.push((row, row, stencil.diagonal()));
        let idx = band.grid_index(row);
        for (offset, weight) in stencil.entries() {
          let neighbor = [idx[0] + offset[0], idx[1] + offset[1], idx[2] + offset[2]];
          match band.row_of(neighbor) {
            Some(col) => triplets.push((row, col, weight)),
            None => {
              return Err(CpmError::config(format!(
                "band too narrow: interior point {row} misses stencil neighbor {neighbor:?}"
              )))
            }
          }
        }
      }
      Ok(triplets)
    })
    .collect::<Result<_, CpmError>>()?;

  let mut mat = SparseMatrix::zeros(n, n);
  for triplets in local {
    mat.extend(triplets);
  }
  tracing::debug!(nnz = mat.triplets().len(), n, "difference operator assembled");
  Ok(mat.to_nalgebra_csr())
}

/// Assemble the interpolation operator mapping band values to arbitrary
/// query points (matrix columns), using tensor-product Lagrange
/// interpolation of the given degree.
pub fn build_interp_matrix(
  band: &Band,
  points: &na::DMatrix<f64>,
  degree: usize,
) -> Result<nas::CsrMatrix<f64>, CpmError> {
  if points.nrows() != band.dim() {
    return Err(CpmError::config(format!(
      "query points live in dimension {}, band in {}",
      points.nrows(),
      band.dim()
    )));
  }
  if degree == 0 || degree > band.interp_degree() {
    return Err(CpmError::config(format!(
      "interpolation degree {degree} outside the band's supported range 1..={}",
      band.interp_degree()
    )));
  }

  let dim = band.dim();
  let nquery = points.ncols();
  let part = crate::partition::Partition::block(nquery, band.partition().nworkers());

  let local: Vec<Vec<(usize, usize, f64)>> = (0..part.nworkers())
    .into_par_iter()
    .map(|rank| {
      let mut triplets = Vec::new();
      for row in part.local_range(rank) {
        let point = points.column(row);
        let mut base = [0i64; 3];
        let mut axis_weights: [Vec<f64>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for axis in 0..dim {
          let t = (point[axis] - band.ll()[axis]) / band.dx();
          base[axis] = stencil_base(t, degree);
          axis_weights[axis] = lagrange_weights(t - base[axis] as f64, degree);
        }

        let nnodes_per_axis = degree + 1;
        for flat in 0..nnodes_per_axis.pow(dim as u32) {
          let mut digits = flat;
          let mut node = [0i64; 3];
          let mut weight = 1.0;
          for axis in 0..dim {
            let digit = digits % nnodes_per_axis;
            digits /= nnodes_per_axis;
            node[axis] = base[axis] + digit as i64;
            weight *= axis_weights[axis][digit];
          }
          let col = band.row_of(node).ok_or_else(|| {
            CpmError::config(format!(
              "band too narrow: interpolation node {node:?} for query point {row} not in band"
            ))
          })?;
          triplets.push((row, col, weight));
        }
      }
      Ok(triplets)
    })
    .collect::<Result<_, CpmError>>()?;

  let mut mat = SparseMatrix::zeros(nquery, band.len());
  for triplets in local {
    mat.extend(triplets);
  }
  Ok(mat.to_nalgebra_csr())
}

/// The closest-point extension operator: interpolation at every band
/// point's surface projection. Square over the band.
pub fn build_extension_matrix(band: &Band, degree: usize) -> Result<nas::CsrMatrix<f64>, CpmError> {
  build_interp_matrix(band, band.closest_points(), degree)
}

/// Apply an operator to a field, checking shapes against the band
/// partition first.
pub fn apply(op: &nas::CsrMatrix<f64>, field: &Field) -> Result<Field, CpmError> {
  if op.ncols() != field.len() {
    return Err(CpmError::PartitionMismatch {
      expected: op.ncols(),
      found: field.len(),
    });
  }
  Ok(op * field)
}

/// Compose two operators as a sparse matrix product (`l` after `r`).
pub fn compose(
  l: &nas::CsrMatrix<f64>,
  r: &nas::CsrMatrix<f64>,
) -> Result<nas::CsrMatrix<f64>, CpmError> {
  if l.ncols() != r.nrows() {
    return Err(CpmError::PartitionMismatch {
      expected: l.ncols(),
      found: r.nrows(),
    });
  }
  Ok(l * r)
}

/// Index of the first interpolation node along one axis, in grid
/// coordinates. Centers the `degree + 1` nodes around the query.
fn stencil_base(t: f64, degree: usize) -> i64 {
  if degree % 2 == 1 {
    t.floor() as i64 - (degree as i64) / 2
  } else {
    t.round() as i64 - (degree as i64) / 2
  }
}

/// One-dimensional Lagrange weights on the integer nodes `0..=degree`,
/// evaluated at `rel`.
fn lagrange_weights(rel: f64, degree: usize) -> Vec<f64> {
  (0..=degree)
    .map(|i| {
      (0..=degree)
        .filter(|&j| j != i)
        .map(|j| (rel - j as f64) / (i as f64 - j as f64))
        .product()
    })
    .collect()
}
