//! Resolution sweeps and error measurement against reference solutions.

use itertools::Itertools;

use crate::{
  band::{Band, BandParams, Resolution},
  error::CpmError,
  operators,
  scheme::SchemeConfig,
  solver::TimeStepper,
  stencil::Stencil,
  surface::Surface,
};

/// One `(dx, error)` sample of a resolution sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRecord {
  pub dx: f64,
  pub error: f64,
}

/// Accumulated sweep samples, owned by the sweep driver rather than
/// shared mutable state across iterations.
#[derive(Debug, Clone, Default)]
pub struct SweepResult {
  records: Vec<ErrorRecord>,
}

impl SweepResult {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, dx: f64, error: f64) {
    self.records.push(ErrorRecord { dx, error });
  }

  pub fn records(&self) -> &[ErrorRecord] {
    &self.records
  }
  pub fn len(&self) -> usize {
    self.records.len()
  }
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Empirical convergence order between consecutive refinement levels.
  pub fn convergence_orders(&self) -> Vec<f64> {
    self
      .records
      .iter()
      .tuple_windows()
      .map(|(prev, next)| {
        crate::util::algebraic_convergence_rate(next.error, prev.error, next.dx, prev.dx)
      })
      .collect()
  }
}

/// Infinity norm of the deviation between a computed field restricted
/// to query points and the reference values there. Pure; the inputs
/// are untouched.
pub fn sup_error(computed: &na::DVector<f64>, exact: &na::DVector<f64>) -> f64 {
  assert_eq!(computed.len(), exact.len());
  (computed - exact).amax()
}

#[derive(Clone)]
pub struct SweepConfig {
  pub scheme: SchemeConfig,
  pub band: BandParams,
  /// Time horizon of every resolution level.
  pub tf: f64,
  /// Interpolation degree for restricting the field to query points.
  pub query_degree: usize,
}

/// Run the full pipeline once per resolution level and collect
/// `(dx, error)` records.
///
/// Levels must be strictly refining. Band, operators and fields of a
/// level are dropped when its scope ends, including on the divergence
/// path: an implicit solve that diverges aborts only that level, logs
/// it and leaves no record behind.
pub fn run_sweep(
  surface: &dyn Surface,
  resolutions: &[Resolution],
  config: &SweepConfig,
  initial: &(dyn Fn(na::DVectorView<f64>) -> f64 + Sync),
  query_points: &na::DMatrix<f64>,
  exact: &dyn Fn(f64) -> na::DVector<f64>,
) -> Result<SweepResult, CpmError> {
  let mut result = SweepResult::new();
  let mut prev_dx = f64::INFINITY;

  for &resolution in resolutions {
    let params = BandParams {
      resolution,
      ..config.band.clone()
    };
    let band = Band::build(surface, &params)?;
    if band.dx() >= prev_dx {
      return Err(CpmError::config(format!(
        "sweep resolutions must be strictly refining: dx {} after {}",
        band.dx(),
        prev_dx
      )));
    }
    prev_dx = band.dx();

    match run_level(&band, config, initial, query_points, exact) {
      Ok(error) => {
        tracing::info!(dx = band.dx(), error, "sweep level finished");
        result.push(band.dx(), error);
      }
      Err(CpmError::SolverDivergence(reason)) => {
        tracing::warn!(dx = band.dx(), reason, "sweep level aborted, continuing");
      }
      Err(other) => return Err(other),
    }
  }

  Ok(result)
}

fn run_level(
  band: &Band,
  config: &SweepConfig,
  initial: &(dyn Fn(na::DVectorView<f64>) -> f64 + Sync),
  query_points: &na::DMatrix<f64>,
  exact: &dyn Fn(f64) -> na::DVector<f64>,
) -> Result<f64, CpmError> {
  let stencil = Stencil::laplacian(band.dim(), band.dx())?;
  let diff = operators::build_diff_matrix(band, &stencil)?;
  let ext = operators::build_extension_matrix(band, band.interp_degree())?;
  let u0 = band.initial_field(initial);

  let mut stepper = TimeStepper::new(&config.scheme, diff, ext, band.dx(), config.tf, u0)?;
  let t = stepper.run()?;

  let restrict = operators::build_interp_matrix(band, query_points, config.query_degree)?;
  let computed = operators::apply(&restrict, stepper.field())?;
  Ok(sup_error(&computed, &exact(t)))
}
