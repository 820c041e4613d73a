//! Order desk configuration: the YAML/JSON schema and its loader.
//!
//! A config names the known companies, the AI service, detection thresholds
//! and the batch and tracker limits. [`load_config`] validates it before any
//! batch can start.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_from_yaml_str};
pub use schema::{
    AiConfig, BatchConfig, CompanyConfig, Config, DetectionConfig, ExtractionMode, TrackerConfig,
};
