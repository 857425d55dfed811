//! Narrow-band embedding grid around a surface.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::{error::CpmError, partition::Partition, surface::Surface};

/// Scalar field over the band points.
///
/// Length must equal the band's global size; operator application
/// checks this and reports a partition mismatch otherwise.
pub type Field = na::DVector<f64>;

/// Integer coordinates of a virtual-grid point, relative to the grid's
/// lower-left corner. The third component is zero in 2D.
pub type GridIdx = [i64; 3];

/// Grid resolution selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
  /// Explicit grid spacing.
  Spacing(f64),
  /// Blocks per dimension over the computational domain, which is the
  /// surface bounding box inflated to twice its half-width about its
  /// center. For the unit sphere this is the classic `[-2,2]^3` domain,
  /// so `Blocks(20)` gives `dx = 0.2`.
  Blocks(usize),
}

#[derive(Debug, Clone)]
pub struct BandParams {
  pub resolution: Resolution,
  /// Interpolation degree `p` of the closest-point extension.
  pub interp_degree: usize,
  /// Arm length of the finite-difference stencil.
  pub stencil_arm: usize,
  /// Logical worker count for the row partition.
  pub nworkers: usize,
}

impl Default for BandParams {
  fn default() -> Self {
    Self {
      resolution: Resolution::Spacing(0.1),
      interp_degree: 3,
      stencil_arm: 1,
      nworkers: 4,
    }
  }
}

/// The set of virtual-grid points within a fixed bandwidth of a surface.
///
/// Points within the Ruuth--Merriman interpolation radius
/// `dx sqrt((d-1)((p+1)/2)^2 + (1+(p+1)/2)^2)` are flagged *interior*;
/// the band extends one stencil arm further so that every interior
/// point has a complete difference stencil. Bands are immutable; a
/// finer resolution level builds a fresh one.
pub struct Band {
  dim: usize,
  dx: f64,
  interp_degree: usize,
  ll: na::DVector<f64>,
  grid_idx: Vec<GridIdx>,
  coords: na::DMatrix<f64>,
  closest: na::DMatrix<f64>,
  interior: Vec<bool>,
  rows: HashMap<GridIdx, usize>,
  partition: Partition,
}

impl Band {
  pub fn build(surface: &dyn Surface, params: &BandParams) -> Result<Self, CpmError> {
    let dim = surface.dim();
    if dim != 2 && dim != 3 {
      return Err(CpmError::config(format!("unsupported dimension {dim}")));
    }
    if params.interp_degree == 0 {
      return Err(CpmError::config("interpolation degree must be at least 1"));
    }
    if params.nworkers == 0 {
      return Err(CpmError::config("worker count must be positive"));
    }

    let (lo, hi) = surface.bounding_box();
    let extent = (&hi - &lo).max();
    let dx = match params.resolution {
      Resolution::Spacing(dx) => dx,
      Resolution::Blocks(m) => {
        if m == 0 {
          return Err(CpmError::config("block count must be positive"));
        }
        2.0 * extent / m as f64
      }
    };
    if !(dx > 0.0) {
      return Err(CpmError::config(format!("grid spacing must be positive, got {dx}")));
    }

    let p = params.interp_degree as f64;
    let half_support = (p + 1.0) / 2.0;
    let bw_inner =
      dx * ((dim as f64 - 1.0) * half_support.powi(2) + (1.0 + half_support).powi(2)).sqrt();
    let bw_outer = bw_inner + params.stencil_arm as f64 * dx;

    let ll = na::DVector::from_iterator(dim, lo.iter().map(|&l| l - bw_outer - dx));
    let shape: Vec<i64> = (0..dim)
      .map(|axis| ((hi[axis] + bw_outer + dx - ll[axis]) / dx).ceil() as i64 + 1)
      .collect();
    let kmax = if dim == 3 { shape[2] } else { 1 };

    // closest-point projection of every candidate grid point, one
    // x-slab per task
    let slabs: Vec<Vec<(GridIdx, na::DVector<f64>, na::DVector<f64>, bool)>> = (0..shape[0])
      .into_par_iter()
      .map(|i| {
        let mut slab = Vec::new();
        let mut point = na::DVector::zeros(dim);
        for j in 0..shape[1] {
          for k in 0..kmax {
            let idx = [i, j, k];
            for axis in 0..dim {
              point[axis] = ll[axis] + dx * idx[axis] as f64;
            }
            let (cp, dist) = surface.closest_point(point.as_view());
            if dist <= bw_outer {
              slab.push((idx, point.clone(), cp, dist <= bw_inner));
            }
          }
        }
        slab
      })
      .collect();

    let npoints: usize = slabs.iter().map(|s| s.len()).sum();
    if npoints == 0 {
      return Err(CpmError::config("band is empty; grid spacing too coarse"));
    }

    let mut grid_idx = Vec::with_capacity(npoints);
    let mut coords = na::DMatrix::zeros(dim, npoints);
    let mut closest = na::DMatrix::zeros(dim, npoints);
    let mut interior = Vec::with_capacity(npoints);
    let mut rows = HashMap::with_capacity(npoints);
    for (row, (idx, point, cp, inner)) in slabs.into_iter().flatten().enumerate() {
      grid_idx.push(idx);
      coords.set_column(row, &point);
      closest.set_column(row, &cp);
      interior.push(inner);
      rows.insert(idx, row);
    }

    let partition = Partition::block(npoints, params.nworkers);
    tracing::info!(
      npoints,
      dx,
      ninterior = interior.iter().filter(|&&f| f).count(),
      "band built"
    );

    Ok(Self {
      dim,
      dx,
      interp_degree: params.interp_degree,
      ll,
      grid_idx,
      coords,
      closest,
      interior,
      rows,
      partition,
    })
  }

  pub fn dim(&self) -> usize {
    self.dim
  }
  pub fn dx(&self) -> f64 {
    self.dx
  }
  pub fn interp_degree(&self) -> usize {
    self.interp_degree
  }
  pub fn len(&self) -> usize {
    self.grid_idx.len()
  }
  pub fn is_empty(&self) -> bool {
    self.grid_idx.is_empty()
  }

  /// Lower-left corner of the virtual grid.
  pub fn ll(&self) -> &na::DVector<f64> {
    &self.ll
  }

  /// Band point coordinates as matrix columns.
  pub fn coordinates(&self) -> &na::DMatrix<f64> {
    &self.coords
  }

  /// Closest-point projections as matrix columns.
  pub fn closest_points(&self) -> &na::DMatrix<f64> {
    &self.closest
  }

  pub fn grid_index(&self, row: usize) -> GridIdx {
    self.grid_idx[row]
  }

  pub fn row_of(&self, idx: GridIdx) -> Option<usize> {
    self.rows.get(&idx).copied()
  }

  /// Whether the point lies within the interpolation radius, where
  /// difference stencils are guaranteed complete.
  pub fn is_interior(&self, row: usize) -> bool {
    self.interior[row]
  }

  pub fn partition(&self) -> &Partition {
    &self.partition
  }

  /// Evaluate an initial condition at the band point coordinates.
  pub fn initial_field(&self, f: impl Fn(na::DVectorView<f64>) -> f64) -> Field {
    na::DVector::from_iterator(
      self.len(),
      self.coords.column_iter().map(|c| f(c.as_view())),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::surface::{Circle, Sphere};

  fn circle_band(dx: f64) -> Band {
    let params = BandParams {
      resolution: Resolution::Spacing(dx),
      ..Default::default()
    };
    Band::build(&Circle::unit(), &params).unwrap()
  }

  #[test]
  fn band_points_are_near_the_circle() {
    let band = circle_band(0.1);
    assert!(band.len() > 0);
    for col in band.coordinates().column_iter() {
      let r = col.norm();
      // outer bandwidth for p=3, arm=1 is dx(sqrt(4+9)+1) < 5 dx
      assert!((r - 1.0).abs() < 5.0 * band.dx());
    }
  }

  #[test]
  fn closest_points_lie_on_the_circle() {
    let band = circle_band(0.1);
    for col in band.closest_points().column_iter() {
      assert!((col.norm() - 1.0).abs() < 1e-12);
    }
  }

  #[test]
  fn interior_points_have_full_stencils() {
    let band = circle_band(0.1);
    for row in 0..band.len() {
      if !band.is_interior(row) {
        continue;
      }
      let idx = band.grid_index(row);
      for offset in [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0]] {
        let neighbor = [idx[0] + offset[0], idx[1] + offset[1], idx[2] + offset[2]];
        assert!(band.row_of(neighbor).is_some());
      }
    }
  }

  #[test]
  fn partition_covers_band() {
    let band = circle_band(0.1);
    let part = band.partition();
    assert_eq!(part.global_size(), band.len());
    let total: usize = (0..part.nworkers()).map(|r| part.local_size(r)).sum();
    assert_eq!(total, band.len());
  }

  #[test]
  fn blocks_resolution_matches_classic_domain() {
    let params = BandParams {
      resolution: Resolution::Blocks(20),
      ..Default::default()
    };
    let band = Band::build(&Sphere::unit(), &params).unwrap();
    // unit sphere: domain [-2,2]^3, 20 blocks -> dx = 0.2
    assert!((band.dx() - 0.2).abs() < 1e-12);
  }

  #[test]
  fn initial_field_matches_band_size() {
    let band = circle_band(0.2);
    let u = band.initial_field(|x| x[0]);
    assert_eq!(u.len(), band.len());
    assert_eq!(u.len(), band.partition().global_size());
  }
}
