// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the wagate gateway.
//!
//! TOML files and `WAGATE_*` environment variables are layered with figment,
//! unknown keys are rejected, and every problem is reported as a miette
//! diagnostic.
//!
//! ```no_run
//! let config = match wagate_config::load_and_validate() {
//!     Ok(config) => config,
//!     Err(errors) => {
//!         wagate_config::render_errors(&errors);
//!         std::process::exit(1);
//!     }
//! };
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

use std::path::Path;

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    HubConfig, LogFormat, LoggingConfig, QueueConfig, ReconnectConfig, ServerConfig, SessionSeed,
    WagateConfig, WebhookDeliveryConfig, WebhookEntry,
};

/// Load from the standard locations and validate.
pub fn load_and_validate() -> Result<WagateConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || read_sources(&loader::search_paths()))
}

/// Load one explicit file (plus environment overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<WagateConfig, Vec<ConfigError>> {
    if !path.is_file() {
        return Err(vec![ConfigError::Other(format!(
            "config file {} does not exist",
            path.display()
        ))]);
    }
    finish(
        loader::load_config_from_path(path),
        || read_sources(&[path.to_path_buf()]),
    )
}

/// Load a TOML string and validate. No files or environment are consulted.
pub fn load_and_validate_str(toml: &str) -> Result<WagateConfig, Vec<ConfigError>> {
    finish(
        loader::load_config_from_str(toml),
        || vec![("<inline>".to_string(), toml.to_string())],
    )
}

#[allow(clippy::result_large_err)]
fn finish(
    loaded: Result<WagateConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<WagateConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

fn read_sources(paths: &[std::path::PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            Some((shown.display().to_string(), content))
        })
        .collect()
}
