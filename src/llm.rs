use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::llm::ChatTransport;
use crate::agent::llm::openai::OpenAITransport;
use crate::agent::llm::proxy::ProxyTransport;
use crate::config::{ClientConfig, Config, ProviderConfig};
use crate::error::Result;
use crate::router::{DEEPSEEK, OFFICIAL, POLZA, ProviderRouter};

/// API tokens of the configured providers
#[derive(Debug, Clone, Default)]
pub struct ProviderTokens {
    pub official: String,
    pub deepseek: String,
    pub polza: String,
}

/// Create an OpenAI-compatible transport for one provider
pub fn create_provider(name: &str, config: &ProviderConfig, token: &str) -> Result<OpenAITransport> {
    if token.is_empty() {
        warn!("No API token for provider {}", name);
    }
    OpenAITransport::with_headers(name, &config.base_url, token, config.timeout(), &config.headers)
}

/// Create the router over every configured provider
pub fn create_router(config: &Config, tokens: &ProviderTokens) -> Result<ProviderRouter> {
    let providers = [
        (OFFICIAL, &config.providers.official, &tokens.official),
        (DEEPSEEK, &config.providers.deepseek, &tokens.deepseek),
        (POLZA, &config.providers.polza, &tokens.polza),
    ];

    let mut transports: HashMap<String, Arc<dyn ChatTransport>> = HashMap::new();
    for (name, provider, token) in providers {
        info!("Provider {} at {}", name, provider.base_url);
        let mut transport = create_provider(name, provider, token)?;
        if let Some(model) = &provider.auto_model {
            transport = transport.with_auto_model(&config.routing.sentinel, model);
        }
        transports.insert(name.to_string(), Arc::new(transport));
    }

    Ok(ProviderRouter::new(config.routing.clone(), transports)?)
}

/// Create a transport that talks to a remote proxy instead of the providers
pub fn create_proxy(config: &ClientConfig) -> Result<ProxyTransport> {
    info!("Using remote proxy at {}", config.base_url);
    ProxyTransport::new(&config.base_url, config.verify_ssl, config.timeout())
}
