//! Merge rules: defaults first, later sources override earlier ones.

use crate::repository::DEFAULT_MAX_ORDER;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("repository.max_order", DEFAULT_MAX_ORDER as u64)?
        .set_default("storage.store_path", ".strata/store")?
        .set_default("reader.follow_symlinks", false)?
        .set_default("reader.ignore", vec![".strata", ".git"])
}
