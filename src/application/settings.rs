#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ChatParams;
use crate::domain::models::DEFAULT_MAX_TOKENS;
use crate::domain::models::DEFAULT_TEMPERATURE;
use crate::domain::services::SupervisorSettings;

/// Parses an optional config value. Empty means unset.
pub fn parse_optional<T: FromStr>(key: ConfigKey, val: &str) -> Result<Option<T>> {
    let val = val.trim();
    if val.is_empty() {
        return Ok(None);
    }

    match val.parse::<T>() {
        Ok(res) => return Ok(Some(res)),
        Err(_) => bail!(format!("Invalid value for '{key}': {val}")),
    }
}

/// Parses the health check interval in milliseconds. Zero is rejected.
pub fn parse_interval(val: &str) -> Result<Option<Duration>> {
    let key = ConfigKey::HealthCheckInterval;
    match parse_optional::<u64>(key, val)? {
        Some(0) => bail!(format!("Invalid value for '{key}': 0, expected at least 1")),
        interval => return Ok(interval.map(Duration::from_millis)),
    }
}

pub fn supervisor_settings() -> Result<SupervisorSettings> {
    let interval = parse_interval(&Config::get(ConfigKey::HealthCheckInterval))?;
    let timeout = parse_optional::<u64>(
        ConfigKey::HealthCheckTimeout,
        &Config::get(ConfigKey::HealthCheckTimeout),
    )?;

    return Ok(SupervisorSettings {
        models_dir: PathBuf::from(Config::get(ConfigKey::ModelsDir)),
        log_dir: PathBuf::from(Config::get(ConfigKey::LogDir)),
        port: parse_optional::<u16>(ConfigKey::Port, &Config::get(ConfigKey::Port))?,
        probe_interval: interval,
        probe_timeout: timeout.map(Duration::from_millis),
    });
}

/// Builds chat parameters from raw values. Invalid values are replaced by
/// their defaults and reported as warnings.
pub fn chat_params(temperature: &str, max_tokens: &str, stream: &str) -> (ChatParams, Vec<String>) {
    let mut params = ChatParams::default();
    let mut warnings = vec![];

    match ChatParams::parse_temperature(temperature) {
        Ok(val) => params.temperature = val,
        Err(err) => warnings.push(format!("{err}, using default {DEFAULT_TEMPERATURE}")),
    }
    match ChatParams::parse_max_tokens(max_tokens) {
        Ok(val) => params.max_tokens = val,
        Err(err) => warnings.push(format!("{err}, using default {DEFAULT_MAX_TOKENS}")),
    }
    match ChatParams::parse_stream(stream) {
        Ok(val) => params.stream = val,
        Err(err) => warnings.push(format!("{err}, using default false")),
    }

    return (params, warnings);
}

pub fn chat_params_from_config() -> (ChatParams, Vec<String>) {
    return chat_params(
        &Config::get(ConfigKey::Temperature),
        &Config::get(ConfigKey::MaxTokens),
        &Config::get(ConfigKey::Stream),
    );
}
