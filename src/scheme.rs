//! Time-stepping schemes and their evolution operators.

use crate::{
  band::Field,
  error::CpmError,
  operators,
  sparse::{identity, scaled},
  util::FaerLu,
};

/// Closest point method variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
  /// Explicit Euler, Ruuth--Merriman: `u <- E (u + dt L u)`.
  Explicit,
  /// Explicit Euler on the stabilized operator,
  /// von Glehn--Maerz--Macdonald: `u <- u + dt M u`.
  SemiImplicit,
  /// Implicit Euler on the stabilized operator:
  /// solve `(I - dt M) u_new = u`.
  Implicit,
}

impl Scheme {
  /// Exponent `k` in the stability bound `dt = c dx^k`.
  pub fn dt_exponent(self) -> i32 {
    match self {
      Scheme::Explicit | Scheme::SemiImplicit => 2,
      Scheme::Implicit => 1,
    }
  }

  /// Default constant `c` in the stability bound.
  pub fn dt_factor(self) -> f64 {
    match self {
      Scheme::Explicit => 0.1,
      Scheme::SemiImplicit => 0.2,
      Scheme::Implicit => 0.5,
    }
  }

  pub fn tag(self) -> &'static str {
    match self {
      Scheme::Explicit => "explicit",
      Scheme::SemiImplicit => "semi-implicit",
      Scheme::Implicit => "implicit",
    }
  }

  /// Stable on-disk selector.
  pub fn index(self) -> u8 {
    match self {
      Scheme::Explicit => 0,
      Scheme::SemiImplicit => 1,
      Scheme::Implicit => 2,
    }
  }

  pub fn from_index(index: u8) -> Option<Self> {
    match index {
      0 => Some(Scheme::Explicit),
      1 => Some(Scheme::SemiImplicit),
      2 => Some(Scheme::Implicit),
      _ => None,
    }
  }
}

/// Stabilization parameter `lambda` of the `M = E L - lambda (I - E)`
/// operator. Surface-dependent; the classic choices are `4/dx^2` for
/// the unit circle/sphere scripts and a fixed `6` for the brain mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stabilization {
  /// `lambda = c / dx^2`.
  Scaled(f64),
  /// Resolution-independent value.
  Fixed(f64),
}

impl Stabilization {
  pub fn value(self, dx: f64) -> f64 {
    match self {
      Stabilization::Scaled(c) => c / (dx * dx),
      Stabilization::Fixed(v) => v,
    }
  }
}

#[derive(Debug, Clone)]
pub struct SchemeConfig {
  pub scheme: Scheme,
  /// Override of the scheme's default `c` in `dt = c dx^k`.
  pub dt_factor: Option<f64>,
  pub stabilization: Stabilization,
}

impl SchemeConfig {
  /// Defaults for a surface of the given dimension: `lambda` scales
  /// with the principal Laplace--Beltrami eigenvalue `2 (d - 1)`-ish
  /// magnitude, `2 d / dx^2`.
  pub fn new(scheme: Scheme, dim: usize) -> Self {
    Self {
      scheme,
      dt_factor: None,
      stabilization: Stabilization::Scaled(2.0 * dim as f64),
    }
  }

  pub fn raw_dt(&self, dx: f64) -> f64 {
    self.dt_factor.unwrap_or(self.scheme.dt_factor()) * dx.powi(self.scheme.dt_exponent())
  }
}

/// The built evolution operator of a scheme, ready to advance a field.
pub enum EvolutionOperator {
  Explicit {
    diff: nas::CsrMatrix<f64>,
    ext: nas::CsrMatrix<f64>,
  },
  SemiImplicit {
    stabilized: nas::CsrMatrix<f64>,
  },
  Implicit {
    system: nas::CsrMatrix<f64>,
    lu: FaerLu,
  },
}

impl EvolutionOperator {
  /// Combine the difference and extension operators into the scheme's
  /// evolution operator. `dt` must already be the adjusted step size.
  pub fn build(
    config: &SchemeConfig,
    diff: nas::CsrMatrix<f64>,
    ext: nas::CsrMatrix<f64>,
    dx: f64,
    dt: f64,
  ) -> Result<Self, CpmError> {
    let n = diff.nrows();
    if diff.ncols() != n || ext.nrows() != n || ext.ncols() != n {
      return Err(CpmError::PartitionMismatch {
        expected: n,
        found: ext.nrows(),
      });
    }

    match config.scheme {
      Scheme::Explicit => Ok(Self::Explicit { diff, ext }),
      Scheme::SemiImplicit => Ok(Self::SemiImplicit {
        stabilized: stabilized_operator(config, diff, ext, dx)?,
      }),
      Scheme::Implicit => {
        let m = stabilized_operator(config, diff, ext, dx)?;
        let system = identity(n) - scaled(m, dt);
        let lu = FaerLu::new(&system)?;
        Ok(Self::Implicit { system, lu })
      }
    }
  }

  /// Advance the field by one step of size `dt`.
  pub fn step(&self, u: &mut Field, dt: f64) -> Result<(), CpmError> {
    match self {
      Self::Explicit { diff, ext } => {
        let du = operators::apply(diff, u)?;
        let unew = &*u + dt * du;
        *u = operators::apply(ext, &unew)?;
      }
      Self::SemiImplicit { stabilized } => {
        let mu = operators::apply(stabilized, u)?;
        *u += dt * mu;
      }
      Self::Implicit { system, lu } => {
        if system.ncols() != u.len() {
          return Err(CpmError::PartitionMismatch {
            expected: system.ncols(),
            found: u.len(),
          });
        }
        let unew = lu.solve(u);
        if !unew.iter().all(|v| v.is_finite()) {
          return Err(CpmError::SolverDivergence(
            "implicit solve produced non-finite values".into(),
          ));
        }
        *u = unew;
      }
    }
    Ok(())
  }

  pub fn diff(&self) -> Option<&nas::CsrMatrix<f64>> {
    match self {
      Self::Explicit { diff, .. } => Some(diff),
      _ => None,
    }
  }
  pub fn ext(&self) -> Option<&nas::CsrMatrix<f64>> {
    match self {
      Self::Explicit { ext, .. } => Some(ext),
      _ => None,
    }
  }
  pub fn stabilized(&self) -> Option<&nas::CsrMatrix<f64>> {
    match self {
      Self::SemiImplicit { stabilized } => Some(stabilized),
      _ => None,
    }
  }
  pub fn system(&self) -> Option<&nas::CsrMatrix<f64>> {
    match self {
      Self::Implicit { system, .. } => Some(system),
      _ => None,
    }
  }
}

/// `M = E L - lambda (I - E)`.
fn stabilized_operator(
  config: &SchemeConfig,
  diff: nas::CsrMatrix<f64>,
  ext: nas::CsrMatrix<f64>,
  dx: f64,
) -> Result<nas::CsrMatrix<f64>, CpmError> {
  let n = diff.nrows();
  let lambda = config.stabilization.value(dx);
  let el = operators::compose(&ext, &diff)?;
  Ok(el + scaled(ext, lambda) - scaled(identity(n), lambda))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    band::{Band, BandParams, Resolution},
    operators::{build_diff_matrix, build_extension_matrix},
    stencil::Stencil,
    surface::Circle,
  };
  use approx::assert_abs_diff_eq;

  fn circle_operators(dx: f64) -> (Band, nas::CsrMatrix<f64>, nas::CsrMatrix<f64>) {
    let params = BandParams {
      resolution: Resolution::Spacing(dx),
      ..Default::default()
    };
    let band = Band::build(&Circle::unit(), &params).unwrap();
    let stencil = Stencil::laplacian(band.dim(), band.dx()).unwrap();
    let diff = build_diff_matrix(&band, &stencil).unwrap();
    let ext = build_extension_matrix(&band, band.interp_degree()).unwrap();
    (band, diff, ext)
  }

  #[test]
  fn constants_are_steady_states_of_every_scheme() {
    let (band, diff, ext) = circle_operators(0.15);
    let dx = band.dx();
    for scheme in [Scheme::Explicit, Scheme::SemiImplicit, Scheme::Implicit] {
      let config = SchemeConfig::new(scheme, band.dim());
      let dt = config.raw_dt(dx);
      let evo = EvolutionOperator::build(&config, diff.clone(), ext.clone(), dx, dt).unwrap();
      let mut u = band.initial_field(|_| 1.0);
      evo.step(&mut u, dt).unwrap();
      for v in u.iter() {
        assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-8);
      }
    }
  }

  #[test]
  fn scheme_exposes_only_its_own_operators() {
    let (band, diff, ext) = circle_operators(0.2);
    let dx = band.dx();
    let config = SchemeConfig::new(Scheme::SemiImplicit, band.dim());
    let evo = EvolutionOperator::build(&config, diff, ext, dx, config.raw_dt(dx)).unwrap();
    assert!(evo.diff().is_none());
    assert!(evo.stabilized().is_some());
    assert!(evo.system().is_none());
  }

  #[test]
  fn step_size_bounds_follow_the_scheme() {
    let dx = 0.1;
    let explicit = SchemeConfig::new(Scheme::Explicit, 3);
    assert_abs_diff_eq!(explicit.raw_dt(dx), 0.1 * dx * dx);
    let implicit = SchemeConfig::new(Scheme::Implicit, 3);
    assert_abs_diff_eq!(implicit.raw_dt(dx), 0.5 * dx);
  }

  #[test]
  fn mismatched_operator_shapes_are_rejected() {
    let (band, diff, _) = circle_operators(0.2);
    let config = SchemeConfig::new(Scheme::Explicit, band.dim());
    let wrong = identity(band.len() + 1);
    assert!(matches!(
      EvolutionOperator::build(&config, diff, wrong, band.dx(), 1e-3),
      Err(CpmError::PartitionMismatch { .. })
    ));
  }
}
