//! Gateway configuration: YAML schema, defaults, loading and validation.

pub mod defaults;
pub mod duration_format;
pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ValidationResult, ValidationWarning};
pub use loader::{
    default_config_paths, find_config_file, load_and_validate, load_config, parse_config,
    substitute_env_vars, validate,
};
pub use schema::{AuditConfig, Config, RiskConfig, SlackSettings, SlackTarget};
