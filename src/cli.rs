use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::llm::ProviderTokens;

// Display order for provider token options (placed at top of help text)
const TOKEN_DISPLAY_ORDER: usize = 0;
// Display order for log level option (placed at end of help text)
const LOG_LEVEL_DISPLAY_ORDER: usize = 100;

/// CLI arguments
#[derive(Parser)]
#[command(name = "toolrelay", version, about = "Tool-calling conversations over routed LLM providers", long_about = None)]
pub struct Cli {
    /// Log level (see https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
    /// [env: TOOLRELAY_LOG=] [default: info]
    #[arg(
        long,
        env = "TOOLRELAY_LOG",
        default_value = "info",
        global = true,
        hide_default_value = true,
        hide_env = true,
        display_order = LOG_LEVEL_DISPLAY_ORDER,
        verbatim_doc_comment
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a default toolrelay.toml config file
    Init(InitArgs),
    /// Serve the provider router over HTTP
    Serve(ServeArgs),
    /// Ask a single question and print the answer
    Ask(AskArgs),
}

/// Arguments for the init command
#[derive(Parser)]
pub struct InitArgs {
    /// Path to config file
    #[arg(long, default_value = "toolrelay.toml")]
    pub config: String,

    /// Override existing config file
    #[arg(long)]
    pub r#override: bool,
}

/// Provider API tokens
#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// API token of the official OpenAI provider
    #[arg(long, env = "OFFICIAL_OPENAI__TOKEN", default_value = "", hide_default_value = true, hide_env_values = true, display_order = TOKEN_DISPLAY_ORDER)]
    pub official_token: String,

    /// API token of the DeepSeek provider
    #[arg(long, env = "DEEPSEEK_OPENAI__TOKEN", default_value = "", hide_default_value = true, hide_env_values = true, display_order = TOKEN_DISPLAY_ORDER)]
    pub deepseek_token: String,

    /// API token of the Polza provider
    #[arg(long, env = "POLZA_OPENAI__TOKEN", default_value = "", hide_default_value = true, hide_env_values = true, display_order = TOKEN_DISPLAY_ORDER)]
    pub polza_token: String,
}

impl From<TokenArgs> for ProviderTokens {
    fn from(args: TokenArgs) -> Self {
        Self {
            official: args.official_token,
            deepseek: args.deepseek_token,
            polza: args.polza_token,
        }
    }
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Path to config file (initialize with `toolrelay init`)
    #[arg(long, default_value = "toolrelay.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. routing.primary=official)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,

    /// Listen address [default: server.bind from config]
    #[arg(long)]
    pub bind: Option<String>,

    #[command(flatten)]
    pub tokens: TokenArgs,
}

/// Arguments for the ask command
#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Question for the model
    pub prompt: String,

    /// Path to config file (initialize with `toolrelay init`)
    #[arg(long, default_value = "toolrelay.toml")]
    pub config: String,

    /// Override config values using dot notation (e.g. routing.primary=official)
    #[arg(long = "config-override")]
    pub config_overrides: Vec<String>,

    /// Model identifier: `auto`, an exact model, or `<provider>:<model>`
    #[arg(long, default_value = "auto")]
    pub model: String,

    /// Send requests through the proxy at client.base_url instead of the providers
    #[arg(long)]
    pub remote: bool,

    /// System prompt (repeatable)
    #[arg(long = "system", conflicts_with = "system_files")]
    pub system_prompts: Vec<String>,

    /// File holding a system prompt (repeatable)
    #[arg(long = "system-file")]
    pub system_files: Vec<PathBuf>,

    #[command(flatten)]
    pub tokens: TokenArgs,
}

impl AskArgs {
    /// Inline and file prompts as optional sources
    pub fn prompt_sources(&self) -> (Option<Vec<String>>, Option<Vec<PathBuf>>) {
        let inline = (!self.system_prompts.is_empty()).then(|| self.system_prompts.clone());
        let files = (!self.system_files.is_empty()).then(|| self.system_files.clone());
        (inline, files)
    }
}
