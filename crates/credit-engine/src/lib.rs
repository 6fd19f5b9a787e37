//! Credit decision engine for the lending backoffice.
//!
//! The [`decision`] module holds the engine proper: the rule registry and comparison kernel,
//! the scorecard scoring engine and its script compiler, the strategy executor, the
//! champion/challenger router and the model performance analytics. The remaining modules
//! carry the configuration, error and logging plumbing shared with the API service.

pub mod config;
pub mod decision;
pub mod error;
pub mod telemetry;
