//! Bayesian optimization designer and its configuration.
mod config;
mod designer;

pub use config::*;
pub use designer::*;
