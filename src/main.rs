use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use toolrelay::agent::llm::ChatTransport;
use toolrelay::agent::r#loop::AgentLoop;
use toolrelay::cli::{AskArgs, Cli, Commands, InitArgs, ServeArgs};
use toolrelay::config::Config;
use toolrelay::llm::{create_proxy, create_router};
use toolrelay::server;
use toolrelay::util::ensure_prompts;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init(args) => init(args),
        Commands::Serve(args) => serve(args).await,
        Commands::Ask(args) => ask(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

fn init(args: InitArgs) -> anyhow::Result<()> {
    if Path::new(&args.config).exists() && !args.r#override {
        bail!(
            "{} already exists, pass --override to replace it",
            args.config
        );
    }
    std::fs::write(&args.config, Config::default().to_toml()?)
        .with_context(|| format!("Failed to write {}", args.config))?;
    info!("Created {}", args.config);
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config, &args.config_overrides)?;
    let router = create_router(&config, &args.tokens.into())?;
    let bind = args.bind.unwrap_or(config.server.bind);
    server::serve(&bind, Arc::new(router)).await
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config, &args.config_overrides)?;
    let (inline, files) = args.prompt_sources();
    let prompts = ensure_prompts(inline, files)?;

    let transport: Arc<dyn ChatTransport> = if args.remote {
        Arc::new(create_proxy(&config.client)?)
    } else {
        Arc::new(create_router(&config, &args.tokens.into())?)
    };

    let mut agent = AgentLoop::new(transport)
        .system_prompts(prompts)
        .model(args.model)
        .max_rounds(config.client.max_rounds);
    let answer = agent.request(&args.prompt).await?;
    println!("{}", answer);
    Ok(())
}
