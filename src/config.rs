use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::router::RoutingTable;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    pub routing: RoutingTable,
    pub client: ClientConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the proxy endpoint listens on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".into(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub official: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub polza: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            official: ProviderConfig::with_base_url("https://api.openai.com/v1", Some("gpt-4.1")),
            deepseek: ProviderConfig::with_base_url("https://api.deepseek.com/v1", Some("deepseek-chat")),
            polza: ProviderConfig::with_base_url("https://api.polza.ai/api/v1", None),
        }
    }
}

/// One OpenAI-compatible backend
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Concrete model sent upstream when a request names the routing sentinel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_model: Option<String>,
}

impl ProviderConfig {
    fn with_base_url(base_url: &str, auto_model: Option<&str>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
            auto_model: auto_model.map(str::to_string),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for conversations talking to a remote proxy
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub verify_ssl: bool,
    pub timeout_secs: u64,
    /// Upper bound on model calls per turn (unbounded when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://simple-openai-proxy.nachert.art".into(),
            verify_ssl: true,
            timeout_secs: default_timeout_secs(),
            max_rounds: None,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Load the config file over the defaults and apply `key.path=value` overrides.
    ///
    /// Tables are merged key by key, so a section naming only `base_url`
    /// keeps the default `timeout_secs` and `auto_model` of that provider.
    pub fn load(path: &str, overrides: &[String]) -> anyhow::Result<Self> {
        let mut root = match toml::Value::try_from(Config::default())? {
            toml::Value::Table(table) => table,
            _ => bail!("Default configuration is not a table"),
        };

        if Path::new(path).exists() {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
            let file = content
                .parse::<toml::Table>()
                .with_context(|| format!("Failed to parse {}", path))?;
            merge(&mut root, file);
        } else {
            info!("Config file {} not found, using defaults", path);
        }

        for item in overrides {
            apply_override(&mut root, item)?;
        }

        let config: Config = toml::Value::Table(root)
            .try_into()
            .context("Invalid configuration")?;
        debug!("Loaded config: {:?}", config);
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) if matches!(base.get(&key), Some(toml::Value::Table(_))) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge(existing, incoming);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Set a dotted key (e.g. `routing.primary=official`) inside a TOML table
fn apply_override(root: &mut toml::Table, item: &str) -> anyhow::Result<()> {
    let Some((key, raw)) = item.split_once('=') else {
        bail!("Invalid config override '{}', expected key=value", item);
    };
    let parts: Vec<&str> = key.trim().split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        bail!("Invalid config override key '{}'", key);
    }

    let mut table = root;
    for part in &parts[..parts.len() - 1] {
        let entry = table
            .entry(part.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        table = match entry {
            toml::Value::Table(t) => t,
            _ => bail!("Config override '{}' goes through non-table '{}'", item, part),
        };
    }

    table.insert(parts[parts.len() - 1].to_string(), parse_value(raw.trim()));
    Ok(())
}

/// TOML literal when it parses as one, plain string otherwise
fn parse_value(raw: &str) -> toml::Value {
    format!("value = {}", raw)
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut t| t.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
