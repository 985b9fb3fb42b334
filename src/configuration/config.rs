#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    Backend,
    Model,
    ModelsDir,
    LogDir,
    Port,
    HealthCheckInterval,
    HealthCheckTimeout,
    Temperature,
    MaxTokens,
    Stream,
    ConfigFile,
}

fn possible_values(cmd: &Command, key: ConfigKey) -> Vec<String> {
    if let Some(arg) = cmd
        .get_arguments()
        .find(|e| return e.get_long() == Some(key.to_string().as_str()))
    {
        return arg
            .get_possible_values()
            .iter()
            .map(|e| return e.get_name().to_string())
            .collect::<Vec<String>>();
    }

    return vec![];
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let home_dir = dirs::home_dir().unwrap_or_else(|| return path::PathBuf::from("."));

        #[cfg(not(target_os = "macos"))]
        let config_path = dirs::config_dir()
            .unwrap_or_else(|| return home_dir.join(".config"))
            .join("lmdeck/config.toml");
        #[cfg(target_os = "macos")]
        let config_path = home_dir.join(".config/lmdeck/config.toml");

        let res = match key {
            ConfigKey::Backend => "".to_string(),
            ConfigKey::Model => "".to_string(),
            ConfigKey::ModelsDir => home_dir.join("lmdeck").to_string_lossy().to_string(),
            ConfigKey::LogDir => env::temp_dir().to_string_lossy().to_string(),
            ConfigKey::Port => "".to_string(),
            ConfigKey::HealthCheckInterval => "".to_string(),
            ConfigKey::HealthCheckTimeout => "".to_string(),
            ConfigKey::Temperature => "0.7".to_string(),
            ConfigKey::MaxTokens => "512".to_string(),
            ConfigKey::Stream => "false".to_string(),

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
        };

        return res;
    }

    /// Reads the values a config file sets, validated against the possible
    /// values of the matching CLI arguments.
    pub async fn read_file(cmd: &Command, config_path: &path::Path) -> Result<Vec<(ConfigKey, String)>> {
        let toml_str = fs::read_to_string(config_path).await?;
        let doc = toml_str.parse::<toml_edit::Document>()?;

        let mut res = vec![];
        for key in ConfigKey::iter() {
            let val = match doc.get(&key.to_string()) {
                Some(val) => val,
                None => continue,
            };

            let val_str = if let Some(val_int) = val.as_integer() {
                val_int.to_string()
            } else if let Some(val_float) = val.as_float() {
                val_float.to_string()
            } else if let Some(val_bool) = val.as_bool() {
                val_bool.to_string()
            } else if let Some(val_str) = val.as_str() {
                val_str.to_string()
            } else {
                bail!(format!("config.toml has an unsupported value for key '{key}'"));
            };
            if val_str.is_empty() {
                continue;
            }

            let possible_values = possible_values(cmd, key);
            if !possible_values.is_empty() && !possible_values.contains(&val_str) {
                bail!(format!(
                    "config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}",
                    possible_values.join(", ")
                ));
            }

            res.push((key, val_str));
        }

        return Ok(res);
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }
        Config::set(ConfigKey::ConfigFile, &config_file);

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            for (key, val) in Config::read_file(&cmd, &config_path).await? {
                Config::set(key, &val);
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            backend = Config::get(ConfigKey::Backend),
            model = Config::get(ConfigKey::Model),
            models_dir = Config::get(ConfigKey::ModelsDir),
            log_dir = Config::get(ConfigKey::LogDir),
            port = Config::get(ConfigKey::Port),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = possible_values(&cmd, key).join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<f64>().is_ok() || val.parse::<bool>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
