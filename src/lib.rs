#![warn(missing_docs)]
//! Learn per-instance algorithm schedules for a portfolio of solvers.
//!
//! Given precomputed per-instance performance measurements and feature
//! vectors for a set of candidate algorithms, this crate fits a
//! pairwise-tournament selector (one binary classifier per algorithm pair,
//! aggregated by majority vote) behind a feature preprocessing pipeline and
//! an optional static pre-solving schedule. A cross validation harness with
//! PAR10 scoring turns the whole fit/predict loop into a single
//! lower-is-better scalar, usable both for reporting and as the black-box
//! objective of an external configuration search.
//!
//! Example
//! ```rust
//! use portfolio_selector::csv_parser;
//! use portfolio_selector::datastructures::{Config, PerformanceType};
//! use portfolio_selector::meta_solver::MetaSolver;
//! # use std::path::Path;
//! # use anyhow::Result;
//!
//! fn example() -> Result<()> {
//!     // performance csvs have the header instance,algorithm,performance;
//!     // feature csvs have the header instance,<feature columns>
//!     let scenario = csv_parser::read_scenario(
//!         Path::new("performance.csv"),
//!         Path::new("features.csv"),
//!         PerformanceType::Runtime,
//!         Some(900.0), // cutoff in seconds
//!         false,       // smaller is better
//!     )?;
//!
//!     let solver = MetaSolver::new(12345);
//!     let config = Config::default();
//!
//!     // ten-fold cross validation, scored with the PAR10 metric
//!     let par10 = solver.run_cv(&config, &scenario, 10, None)?;
//!     println!("{par10}");
//!     Ok(())
//! }
//! ```

/// Reading scenarios from performance and feature csv files.
pub mod csv_parser;

/// Scenario, schedule and configuration types shared by all components.
pub mod datastructures;

/// Binary classifier implementations used by the pairwise selector.
pub mod classifiers;

/// Fit/predict orchestration, cross validation and model persistence.
pub mod meta_solver;

/// Feature preprocessing stages and the fixed-order pipeline.
pub mod preprocessing;

/// The static pre-solving schedule contract.
pub mod presolving;

/// Combining pre-solving and selector schedules.
pub mod schedules;

/// The pairwise tournament selector.
pub mod selector;

/// Schedule simulation and penalized scoring.
pub mod validation;

#[cfg(test)]
mod test_utils;
