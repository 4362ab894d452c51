//! Configuration module
//!
//! Handles loading project configuration.

mod project;

pub use project::*;
