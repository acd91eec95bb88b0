//! Diagnosis Configuration Module
//!
//! Every threshold, window size, and rule table the engine uses is an
//! operator-tunable TOML value. A run's output is fully reproducible from
//! (inputs, config version): the config object is passed explicitly into
//! every stage rather than living in ambient module state.
//!
//! ## Loading Order
//!
//! 1. `TRAFFICDX_CONFIG` environment variable (path to TOML file)
//! 2. `diagnosis.toml` in the current working directory
//! 3. Built-in defaults

pub mod defaults;
mod diagnosis_config;

pub use diagnosis_config::*;
