//! Heat flow on the unit circle against the separable exact solution.
//!
//! `u0 = cos(theta)` is the first circular harmonic, so the surface
//! heat equation decays it as `exp(-t) cos(theta)`.

extern crate nalgebra as na;

use cpband::{
  band::{BandParams, Resolution},
  scheme::{Scheme, SchemeConfig},
  surface::Circle,
  sweep::{self, SweepConfig},
};

fn circle_sweep(scheme: Scheme, resolutions: &[Resolution]) -> sweep::SweepResult {
  let _ = tracing_subscriber::fmt().with_test_writer().try_init();

  let circle = Circle::unit();
  let config = SweepConfig {
    scheme: SchemeConfig::new(scheme, 2),
    band: BandParams::default(),
    tf: 0.1,
    query_degree: 3,
  };

  let (points, angles) = circle.parametric_grid(100);
  let exact = move |t: f64| angles.map(|theta| (-t).exp() * theta.cos());

  sweep::run_sweep(&circle, resolutions, &config, &|x| x[0], &points, &exact).unwrap()
}

#[test]
fn explicit_scheme_converges_on_the_circle() {
  let result = circle_sweep(
    Scheme::Explicit,
    &[
      Resolution::Spacing(0.2),
      Resolution::Spacing(0.1),
      Resolution::Spacing(0.05),
    ],
  );

  let records = result.records();
  assert_eq!(records.len(), 3);
  for pair in records.windows(2) {
    assert!(pair[1].error < pair[0].error);
  }
  assert!(records.last().unwrap().error < 1e-2);

  // Ruuth--Merriman is second order; allow slack at coarse levels
  for order in result.convergence_orders() {
    assert!(order > 1.2, "convergence order {order} too low");
  }
}

#[test]
fn semi_implicit_scheme_matches_the_exact_decay() {
  let result = circle_sweep(
    Scheme::SemiImplicit,
    &[Resolution::Spacing(0.2), Resolution::Spacing(0.1)],
  );

  let records = result.records();
  assert_eq!(records.len(), 2);
  assert!(records[1].error < records[0].error);
  assert!(records[1].error < 2e-2);
}

#[test]
fn implicit_scheme_reaches_the_horizon() {
  let result = circle_sweep(Scheme::Implicit, &[Resolution::Spacing(0.1)]);

  // a diverged level would leave no record behind
  let records = result.records();
  assert_eq!(records.len(), 1);
  assert!(records[0].error < 5e-2);
}
