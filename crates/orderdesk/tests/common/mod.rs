//! Shared test utilities for orderdesk integration tests.
//!
//! This module provides:
//! - Fake AI clients and pipelines with scripted behaviour
//! - Builders for configs, companies and source files

pub mod builders;
pub mod fakes;

pub use builders::*;
pub use fakes::*;
