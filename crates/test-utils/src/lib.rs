//! Shared test utilities for the sky tile workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators
//! - Footprint catalog fixtures
//! - Temporary data directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, temp_data_dir};
//! ```

pub mod data_dir;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use data_dir::*;
pub use fixtures::*;
pub use generators::*;
