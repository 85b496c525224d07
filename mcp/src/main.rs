use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use ords_core::config::BridgeConfig;
use ords_mcp_runtime::McpServer;
use ords_mcp_runtime::auth::TokenManager;
use ords_mcp_runtime::executor::Executor;
use ords_mcp_runtime::synthesis::Synthesizer;

#[derive(Parser)]
#[command(
    name = "ords-mcp",
    version,
    about = "MCP server exposing an ORDS REST catalog as dynamically synthesized tools"
)]
struct Cli {
    /// ORDS OpenAPI catalog (discovery) URL
    #[arg(long, env = "ORDS_OPENAPI_URL")]
    openapi_url: String,

    /// Base URL operations execute against
    #[arg(long, env = "ORDS_BASE_URL")]
    base_url: String,

    /// OAuth2 client-credentials token endpoint
    #[arg(long, env = "ORDS_TOKEN_URL")]
    token_url: String,

    /// Schema label embedded in every operation id
    #[arg(long, env = "ORDS_SCHEMA")]
    schema: String,

    /// OAuth2 client id
    #[arg(long, env = "ORDS_CLIENT_ID")]
    client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "ORDS_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Catalog item to skip during synthesis (repeatable)
    #[arg(long = "exclude", value_name = "ITEM")]
    exclude: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // stdout carries the MCP channel; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match BridgeConfig::new(
        cli.openapi_url,
        cli.base_url,
        cli.token_url,
        cli.schema,
        cli.client_id,
        cli.client_secret,
        cli.exclude,
    ) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "startup configuration invalid");
            return ExitCode::FAILURE;
        }
    };

    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenManager::new(
        config.token_url.clone(),
        config.client_id.clone(),
        config.client_secret.clone(),
        http.clone(),
    ));
    let synthesizer = Synthesizer::new(
        config.openapi_url.clone(),
        config.schema.clone(),
        config.exclude.clone(),
        http.clone(),
    );

    // Synthesis failures leave the server running with no tools; the process
    // itself stays up.
    let registry = match synthesizer.synthesize().await {
        Ok(registry) => registry,
        Err(err) => {
            tracing::error!(error = %err, "catalog synthesis failed; serving an empty registry");
            Default::default()
        }
    };

    let executor = Executor::new(config.base_url.clone(), http, tokens);
    let server = McpServer::new(registry, executor);
    match server.serve_stdio().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "mcp server terminated");
            ExitCode::FAILURE
        }
    }
}
