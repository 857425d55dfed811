//! Euler time stepping of a field under a scheme's evolution operator.

use crate::{
  band::Field,
  error::CpmError,
  operators,
  scheme::{EvolutionOperator, SchemeConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
  Initialized,
  Stepping,
  Terminated,
}

/// Advances a field from `t = 0` to the horizon `Tf` in fixed steps.
///
/// The step count is fixed a priori from the scheme's stability bound
/// `dt = c dx^k`: `numtimesteps = ceil(Tf / dt)`, after which `dt` is
/// re-derived as `Tf / numtimesteps` so the horizon is hit exactly.
pub struct TimeStepper {
  evo: EvolutionOperator,
  dt: f64,
  tf: f64,
  numtimesteps: usize,
  kt: usize,
  t: f64,
  u: Field,
  state: StepperState,
}

impl TimeStepper {
  pub fn new(
    config: &SchemeConfig,
    diff: nas::CsrMatrix<f64>,
    ext: nas::CsrMatrix<f64>,
    dx: f64,
    tf: f64,
    u0: Field,
  ) -> Result<Self, CpmError> {
    if !(tf > 0.0) {
      return Err(CpmError::config(format!("time horizon must be positive, got {tf}")));
    }
    if diff.nrows() != u0.len() {
      return Err(CpmError::PartitionMismatch {
        expected: diff.nrows(),
        found: u0.len(),
      });
    }

    let raw_dt = config.raw_dt(dx);
    let numtimesteps = (tf / raw_dt).ceil().max(1.0) as usize;
    let dt = tf / numtimesteps as f64;
    let evo = EvolutionOperator::build(config, diff, ext, dx, dt)?;

    tracing::info!(
      scheme = config.scheme.tag(),
      dt,
      numtimesteps,
      tf,
      "time stepper initialized"
    );

    Ok(Self {
      evo,
      dt,
      tf,
      numtimesteps,
      kt: 0,
      t: 0.0,
      u: u0,
      state: StepperState::Initialized,
    })
  }

  pub fn dt(&self) -> f64 {
    self.dt
  }
  pub fn numtimesteps(&self) -> usize {
    self.numtimesteps
  }
  pub fn time(&self) -> f64 {
    self.t
  }
  pub fn steps_taken(&self) -> usize {
    self.kt
  }
  pub fn state(&self) -> StepperState {
    self.state
  }
  pub fn field(&self) -> &Field {
    &self.u
  }
  pub fn into_field(self) -> Field {
    self.u
  }
  pub fn evolution(&self) -> &EvolutionOperator {
    &self.evo
  }

  /// One Euler step. A no-op once the horizon is reached.
  pub fn step(&mut self) -> Result<(), CpmError> {
    if self.state == StepperState::Terminated {
      return Ok(());
    }
    self.state = StepperState::Stepping;
    self.evo.step(&mut self.u, self.dt)?;
    self.kt += 1;
    // the last step lands on the horizon by construction
    self.t = if self.kt == self.numtimesteps {
      self.state = StepperState::Terminated;
      self.tf
    } else {
      self.kt as f64 * self.dt
    };
    Ok(())
  }

  /// Step to the horizon. Returns the final time.
  pub fn run(&mut self) -> Result<f64, CpmError> {
    while self.state != StepperState::Terminated {
      self.step()?;
    }
    Ok(self.t)
  }

  /// Step to the horizon, handing the field projected through `eplot`
  /// (an interpolation matrix onto surface sample points) to the sink
  /// every `every` steps and at the final step.
  pub fn run_with_snapshots(
    &mut self,
    eplot: &nas::CsrMatrix<f64>,
    every: usize,
    mut sink: impl FnMut(usize, f64, Field),
  ) -> Result<f64, CpmError> {
    assert!(every > 0);
    while self.state != StepperState::Terminated {
      self.step()?;
      if self.kt % every == 0 || self.state == StepperState::Terminated {
        let uplot = operators::apply(eplot, &self.u)?;
        tracing::info!(
          time = self.t,
          progress = 100.0 * self.kt as f64 / self.numtimesteps as f64,
          sup = uplot.amax(),
          "snapshot"
        );
        sink(self.kt, self.t, uplot);
      }
    }
    Ok(self.t)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    band::{Band, BandParams, Resolution},
    operators::{build_diff_matrix, build_extension_matrix, build_interp_matrix},
    scheme::Scheme,
    stencil::Stencil,
    surface::Circle,
  };
  use approx::assert_abs_diff_eq;

  fn circle_stepper(tf: f64) -> (Band, TimeStepper) {
    let params = BandParams {
      resolution: Resolution::Spacing(0.2),
      ..Default::default()
    };
    let band = Band::build(&Circle::unit(), &params).unwrap();
    let stencil = Stencil::laplacian(band.dim(), band.dx()).unwrap();
    let diff = build_diff_matrix(&band, &stencil).unwrap();
    let ext = build_extension_matrix(&band, band.interp_degree()).unwrap();
    let u0 = band.initial_field(|x| x[0]);
    let config = SchemeConfig::new(Scheme::Explicit, band.dim());
    let stepper = TimeStepper::new(&config, diff, ext, band.dx(), tf, u0).unwrap();
    (band, stepper)
  }

  #[test]
  fn horizon_is_hit_exactly() {
    let (_, mut stepper) = circle_stepper(0.05);
    let n = stepper.numtimesteps();
    assert_abs_diff_eq!(n as f64 * stepper.dt(), 0.05, epsilon = 1e-15);
    let t = stepper.run().unwrap();
    assert_eq!(t, 0.05);
    assert_eq!(stepper.steps_taken(), n);
    assert_eq!(stepper.state(), StepperState::Terminated);
  }

  #[test]
  fn stepping_past_the_horizon_is_a_no_op() {
    let (_, mut stepper) = circle_stepper(0.01);
    stepper.run().unwrap();
    let taken = stepper.steps_taken();
    stepper.step().unwrap();
    assert_eq!(stepper.steps_taken(), taken);
  }

  #[test]
  fn snapshots_fire_on_cadence_and_final_step() {
    let (band, mut stepper) = circle_stepper(0.05);
    let (points, _) = Circle::unit().parametric_grid(16);
    let eplot = build_interp_matrix(&band, &points, 1).unwrap();

    let n = stepper.numtimesteps();
    let every = 5;
    let mut seen = Vec::new();
    stepper
      .run_with_snapshots(&eplot, every, |kt, _, uplot| {
        assert_eq!(uplot.len(), 16);
        seen.push(kt);
      })
      .unwrap();

    let mut expected: Vec<usize> = (1..=n).filter(|kt| kt % every == 0).collect();
    if expected.last() != Some(&n) {
      expected.push(n);
    }
    assert_eq!(seen, expected);
  }

  #[test]
  fn heat_flow_decays_the_first_harmonic() {
    // u0 = cos(theta) on the unit circle decays as exp(-t)
    let (band, mut stepper) = circle_stepper(0.2);
    let t = stepper.run().unwrap();

    let (points, angles) = Circle::unit().parametric_grid(64);
    let eplot = build_interp_matrix(&band, &points, band.interp_degree()).unwrap();
    let computed = operators::apply(&eplot, stepper.field()).unwrap();
    for (i, &theta) in angles.iter().enumerate() {
      let exact = (-t).exp() * theta.cos();
      assert_abs_diff_eq!(computed[i], exact, epsilon = 0.05);
    }
  }
}
