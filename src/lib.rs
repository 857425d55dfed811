extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod band;
pub mod error;
pub mod io;
pub mod operators;
pub mod partition;
pub mod scheme;
pub mod solver;
pub mod sparse;
pub mod stencil;
pub mod surface;
pub mod sweep;
pub mod util;

pub use error::CpmError;
