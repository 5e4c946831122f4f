//! # Player configuration
//!
//! Configuration is built in three layers, lowest priority first:
//! - the YAML document embedded in the crate (`pmolive.yaml`)
//! - an optional user YAML file
//! - environment variables prefixed with `PMOLIVE_CONFIG__`
//!
//! Nested keys are separated by `__` in variable names, and values are parsed
//! as YAML so `PMOLIVE_CONFIG__LOAD_TIMEOUT_SECS=15` yields a number.
//!
//! ```no_run
//! use pmolive::config::PlayerConfig;
//!
//! let config = PlayerConfig::load_from_file("live.yaml")?;
//! println!("timeout: {:?}", config.load_timeout());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("pmolive.yaml");

const ENV_CONFIG_FILE: &str = "PMOLIVE_CONFIG";
const ENV_PREFIX: &str = "PMOLIVE_CONFIG__";

const MAX_LOAD_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Seconds a session may stay in `Loading` before it times out.
    pub load_timeout_secs: u64,
    /// Raw sources starting with one of these are unconfigured channel slots.
    pub placeholder_prefixes: Vec<String>,
    /// URL path suffixes that mark a playlist (matched case-insensitively).
    pub playlist_extensions: Vec<String>,
    /// Query substrings that mark a playlist (matched case-insensitively).
    pub manifest_query_tokens: Vec<String>,
    pub native_mime_type: String,
    pub placeholder_message: String,
}

impl Default for PlayerConfig {
    /// The embedded `pmolive.yaml`, without file or environment layers.
    fn default() -> Self {
        Self::build(None, std::iter::empty())
            .expect("embedded pmolive.yaml must be a valid player configuration")
    }
}

impl PlayerConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Loads the configuration using the `PMOLIVE_CONFIG` variable as the
    /// path of the user file, if set.
    pub fn load() -> Result<Self> {
        match env::var(ENV_CONFIG_FILE) {
            Ok(path) => {
                info!(env_var = ENV_CONFIG_FILE, path = %path, "Loading player config from env");
                Self::load_from_file(path)
            }
            Err(_) => Self::build(None, env::vars()),
        }
    }

    /// Loads the configuration from a user YAML file merged over the defaults.
    ///
    /// A missing file is not an error: the defaults are used.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let external = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            info!(config_file = %path.display(), "Loaded player config file");
            Some(data)
        } else {
            info!(config_file = %path.display(), "Config file not found, using embedded defaults");
            None
        };
        Self::build(external.as_deref(), env::vars())
    }

    /// Parses a YAML document merged over the defaults, without environment overrides.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::build(Some(yaml), std::iter::empty())
    }

    fn build(
        external: Option<&str>,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut value: Value =
            serde_yaml::from_str(DEFAULT_CONFIG).context("parsing embedded pmolive.yaml")?;
        if let Some(yaml) = external {
            let external_value: Value = serde_yaml::from_str(yaml)?;
            // an empty document overrides nothing
            if !external_value.is_null() {
                merge_yaml(&mut value, &lower_keys_value(external_value));
            }
        }
        apply_env_overrides(&mut value, vars);
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: PlayerConfig = serde_yaml::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_secs == 0 || self.load_timeout_secs > MAX_LOAD_TIMEOUT_SECS {
            return Err(anyhow!(
                "load_timeout_secs must be within 1..={}, got {}",
                MAX_LOAD_TIMEOUT_SECS,
                self.load_timeout_secs
            ));
        }
        if self.playlist_extensions.is_empty() && self.manifest_query_tokens.is_empty() {
            return Err(anyhow!("at least one playlist marker must be configured"));
        }
        Ok(())
    }
}

fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
            let path: Vec<String> = stripped.split("__").map(|k| k.to_lowercase()).collect();
            debug!(key = %key, "Applying config override from environment");
            set_value(config, &path, convert_env_value(&value));
        }
    }
}

fn set_value(data: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *data = value;
        return;
    };
    if let Value::Mapping(map) = data {
        let entry = map
            .entry(Value::String(head.clone()))
            .or_insert(Value::Mapping(Mapping::new()));
        set_value(entry, rest, value);
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| match k {
                    Value::String(s) => (Value::String(s.to_lowercase()), lower_keys_value(v)),
                    other => (other, lower_keys_value(v)),
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // scalars and sequences are replaced wholesale
        (d, e) => *d = e.clone(),
    }
}
