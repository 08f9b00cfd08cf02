//! Force computation and motion integration

pub mod forces;
pub mod integrator;

pub use forces::*;
pub use integrator::*;
