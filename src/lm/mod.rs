//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides an implementation of the Levenberg-Marquardt algorithm
//! for nonlinear least-squares optimization with Marquardt's diagonal scaling
//! and a finite-difference Jacobian.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{LmStep, StepResult};
