use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::agent::llm::ChatTransport;
use crate::agent::r#loop::AUTO_MODEL;
use crate::agent::types::{ChatRequest, ChatResponse};
use crate::error::{ConfigError, Result};

pub const OFFICIAL: &str = "official";
pub const DEEPSEEK: &str = "deepseek";
pub const POLZA: &str = "polza";

/// Which provider serves which model identifier.
///
/// Rules are evaluated in a fixed order: `<provider>:<model>` prefixes, then
/// exact model identifiers, then the sentinel, then the default provider.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RoutingTable {
    /// Model identifier that enables fallback from `primary` to `secondary`
    pub sentinel: String,
    /// Provider tried first for the sentinel
    pub primary: String,
    /// Provider tried once when the primary fails
    pub secondary: String,
    /// Provider for every model no other rule matches
    pub default: String,
    /// Model identifiers bound to one provider
    pub exact: BTreeMap<String, String>,
    /// `<prefix>:<model>` forms: prefix to provider
    pub prefixes: BTreeMap<String, String>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            sentinel: AUTO_MODEL.into(),
            primary: DEEPSEEK.into(),
            secondary: OFFICIAL.into(),
            default: OFFICIAL.into(),
            exact: BTreeMap::from([
                ("deepseek-chat".into(), DEEPSEEK.into()),
                ("deepseek-chat-fast".into(), DEEPSEEK.into()),
            ]),
            prefixes: BTreeMap::from([(POLZA.into(), POLZA.into())]),
        }
    }
}

/// Outcome of evaluating the routing table for one model identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Route<'a> {
    /// Primary first, secondary once on transport failure
    Fallback { primary: &'a str, secondary: &'a str },
    /// One provider, no fallback; `model` replaces the request's model when set
    Direct {
        provider: &'a str,
        model: Option<String>,
    },
}

impl RoutingTable {
    pub fn resolve(&self, model: &str) -> Result<Route<'_>, ConfigError> {
        if let Some((prefix, bare)) = model.split_once(':') {
            if let Some(provider) = self.prefixes.get(prefix) {
                if bare.is_empty() {
                    return Err(ConfigError::EmptyModelName(format!("{}:", prefix)));
                }
                return Ok(Route::Direct {
                    provider: provider.as_str(),
                    model: Some(bare.to_string()),
                });
            }
        }

        if let Some(provider) = self.exact.get(model) {
            return Ok(Route::Direct {
                provider: provider.as_str(),
                model: None,
            });
        }

        if model == self.sentinel {
            return Ok(Route::Fallback {
                primary: self.primary.as_str(),
                secondary: self.secondary.as_str(),
            });
        }

        Ok(Route::Direct {
            provider: self.default.as_str(),
            model: None,
        })
    }

    fn providers(&self) -> impl Iterator<Item = &String> {
        [&self.primary, &self.secondary, &self.default]
            .into_iter()
            .chain(self.exact.values())
            .chain(self.prefixes.values())
    }
}

/// Picks a provider per request and falls back on the sentinel path
pub struct ProviderRouter {
    table: RoutingTable,
    transports: HashMap<String, Arc<dyn ChatTransport>>,
}

impl ProviderRouter {
    /// Every provider the table names must have a transport
    pub fn new(
        table: RoutingTable,
        transports: HashMap<String, Arc<dyn ChatTransport>>,
    ) -> Result<Self, ConfigError> {
        if let Some(missing) = table.providers().find(|p| !transports.contains_key(*p)) {
            return Err(ConfigError::UnknownProvider(missing.clone()));
        }
        Ok(Self { table, transports })
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub async fn route(&self, request: &ChatRequest) -> Result<ChatResponse> {
        match self.table.resolve(&request.model)? {
            Route::Fallback { primary, secondary } => {
                debug!("Routing '{}' to {} with fallback to {}", request.model, primary, secondary);
                match self.transport(primary)?.send(request).await {
                    Ok(response) => Ok(response),
                    Err(e) if e.is_transport() => {
                        error!("Unable to request {}, trying {}: {}", primary, secondary, e);
                        self.transport(secondary)?.send(request).await
                    }
                    Err(e) => Err(e),
                }
            }
            Route::Direct {
                provider,
                model: Some(model),
            } => {
                debug!("Routing '{}' to {} as '{}'", request.model, provider, model);
                self.transport(provider)?.send(&request.with_model(model)).await
            }
            Route::Direct {
                provider,
                model: None,
            } => {
                debug!("Routing '{}' to {}", request.model, provider);
                self.transport(provider)?.send(request).await
            }
        }
    }

    fn transport(&self, provider: &str) -> Result<&Arc<dyn ChatTransport>, ConfigError> {
        self.transports
            .get(provider)
            .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))
    }
}

#[async_trait]
impl ChatTransport for ProviderRouter {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.route(request).await
    }
}
