#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_DESTINATION: &str = ".";
pub const DEFAULT_SLEEP_SECS: u64 = 0;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_DEPTH: usize = 4;

/// Settings for one batch run, merged from CLI overrides, the environment and
/// the `.env` file.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub destination: PathBuf,
    pub sleep: Duration,
    pub channel_playlists: bool,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub max_depth: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_DESTINATION),
            sleep: Duration::from_secs(DEFAULT_SLEEP_SECS),
            channel_playlists: false,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: default_user_agent(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub destination: Option<PathBuf>,
    pub sleep_secs: Option<u64>,
    pub channel_playlists: Option<bool>,
    pub max_depth: Option<usize>,
    pub env_path: Option<PathBuf>,
}

pub fn default_user_agent() -> String {
    format!("tubestrm/{}", env!("CARGO_PKG_VERSION"))
}

pub fn resolve_runtime_settings(overrides: RuntimeOverrides) -> Result<RuntimeSettings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_runtime_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeSettings> {
    build_runtime_settings_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_runtime_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeSettings> {
    let destination = overrides
        .destination
        .or_else(|| lookup_value("STRM_DESTINATION", file_vars, &env_lookup).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DESTINATION));
    let sleep_secs = overrides
        .sleep_secs
        .or_else(|| {
            lookup_value("STRM_SLEEP_SECS", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u64>().ok())
        })
        .unwrap_or(DEFAULT_SLEEP_SECS);
    let channel_playlists = overrides
        .channel_playlists
        .or_else(|| {
            lookup_value("STRM_CHANNEL_PLAYLISTS", file_vars, &env_lookup)
                .and_then(|value| parse_bool(&value))
        })
        .unwrap_or(false);
    let http_timeout_secs = lookup_value("STRM_HTTP_TIMEOUT_SECS", file_vars, &env_lookup)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    let user_agent = lookup_value("STRM_USER_AGENT", file_vars, &env_lookup)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(default_user_agent);
    let max_depth = overrides
        .max_depth
        .or_else(|| {
            lookup_value("STRM_MAX_DEPTH", file_vars, &env_lookup)
                .and_then(|value| value.parse::<usize>().ok())
        })
        .unwrap_or(DEFAULT_MAX_DEPTH);

    Ok(RuntimeSettings {
        destination,
        sleep: Duration::from_secs(sleep_secs),
        channel_playlists,
        http_timeout: Duration::from_secs(http_timeout_secs),
        user_agent,
        max_depth,
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}
