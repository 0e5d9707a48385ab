//! Jacobi relaxation of the 2D Poisson equation.
//!
//! A Gaussian-modulated source drives a 5-point stencil on a grid with zero
//! boundary values. Runs stop after a fixed number of sweeps or once the L2
//! difference between iterates drops below a threshold, and snapshots are
//! written to flat binary files on a background thread while sweeps continue.

pub mod checkpoint;
pub mod compare;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod report;
pub mod solver;
pub mod stencil;
pub mod visualisation;

pub use config::{Overrides, SolverConfig};
pub use error::{Result, SolverError};
pub use field::{Field, Snapshot};
pub use grid::Grid;
pub use report::{NormCheck, RunSummary};
pub use solver::{Solver, SolverParams};
pub use stencil::ExecutionMode;
