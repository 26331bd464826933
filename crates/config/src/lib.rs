//! Configuration loading and env substitution.
//!
//! Config files: `cadence.toml`, `cadence.yaml`, or `cadence.json`
//! Searched in `./` then `~/.config/cadence/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        config_dir, data_dir, discover_and_load, find_config_file, load_config, set_config_dir,
        set_data_dir,
    },
    schema::{CadenceConfig, CronSection, RunnerConfig, ServerConfig, StoreKind},
};
