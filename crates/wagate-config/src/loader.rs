// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment layering for `wagate.toml`.
//!
//! Later layers win: compiled defaults, `/etc/wagate/wagate.toml`, the user
//! config dir, `./wagate.toml`, then `WAGATE_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is not ours to box

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::WagateConfig;

const SYSTEM_CONFIG: &str = "/etc/wagate/wagate.toml";
const LOCAL_CONFIG: &str = "wagate.toml";

/// Tables that `WAGATE_<TABLE>_<KEY>` variables map into.
const ENV_SECTIONS: &[&str] = &["server", "hub", "queue", "reconnect", "webhook", "logging"];

/// Config files consulted by [`load_config`], lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("wagate").join(LOCAL_CONFIG));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

pub fn load_config() -> Result<WagateConfig, figment::Error> {
    build_figment().extract()
}

/// Load one explicit file plus environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<WagateConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml: &str) -> Result<WagateConfig, figment::Error> {
    defaults().merge(Toml::string(toml)).extract()
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(WagateConfig::default()))
}

/// `WAGATE_HUB_SHARED_KEY` becomes `hub.shared_key`. Only the first
/// underscore after a known table name is rewritten, so keys that contain
/// underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("WAGATE_").map(|key| {
        let key = key.as_str();
        ENV_SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_file_has_highest_file_precedence() {
        let paths = search_paths();
        assert_eq!(paths.first(), Some(&PathBuf::from(SYSTEM_CONFIG)));
        assert_eq!(paths.last(), Some(&PathBuf::from(LOCAL_CONFIG)));
    }

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("WAGATE_HUB_SHARED_KEY", "from-env");
            jail.set_env("WAGATE_WEBHOOK_MAX_ATTEMPTS", "7");
            jail.set_env("WAGATE_SERVER_PORT", "9001");
            let config = defaults().merge(env_provider()).extract::<WagateConfig>()?;
            assert_eq!(config.hub.shared_key.as_deref(), Some("from-env"));
            assert_eq!(config.webhook.max_attempts, 7);
            assert_eq!(config.server.port, 9001);
            Ok(())
        });
    }

    #[test]
    fn file_is_read_relative_to_jail() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(LOCAL_CONFIG, "[queue]\ncapacity = 12\n")?;
            let config = defaults()
                .merge(Toml::file(LOCAL_CONFIG))
                .extract::<WagateConfig>()?;
            assert_eq!(config.queue.capacity, 12);
            Ok(())
        });
    }
}
