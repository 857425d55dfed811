//! Error taxonomy of the closest point method pipeline.

/// Failure modes of band construction, operator assembly and time stepping.
///
/// Configuration and partition mismatches are raised before any assembly
/// work starts, so a misconfigured run fails fast instead of producing
/// operators of the wrong shape.
#[derive(Debug, thiserror::Error)]
pub enum CpmError {
  /// Mismatched dimensions, stencils or sweep setup.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// An implicit linear solve failed to factorize or produced
  /// non-finite values.
  #[error("implicit solve diverged: {0}")]
  SolverDivergence(String),

  /// A field or operator does not match the band partition it is
  /// applied against.
  #[error("size {found} does not match band partition size {expected}")]
  PartitionMismatch { expected: usize, found: usize },

  /// Serialization failure. Aborts only the affected artifact.
  #[error("i/o failure")]
  Io(#[from] std::io::Error),
}

impl CpmError {
  pub fn config(msg: impl Into<String>) -> Self {
    Self::Configuration(msg.into())
  }
}
