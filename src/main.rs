use std::{io::IsTerminal, net::SocketAddr};

use clap::{Parser, Subcommand};
use mcp_tool_server::{
    build_app,
    config::Config,
    logging,
    mcp::stdio::{serve_stdio, StdioOptions},
    AppState,
};
use tokio::io::BufReader;
use tracing::info;

#[derive(Parser)]
#[command(name = "mcp-tool-server")]
#[command(about = "Tool server speaking HTTP and line-delimited JSON-RPC", version, long_about = None)]
struct Cli {
    /// Set log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API (default)
    Serve,
    /// Serve JSON-RPC over stdin/stdout
    Stdio,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let config = Config::from_env()?;
    let state = AppState::new(config.inspector_capacity);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                "server starting"
            );

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;
        }
        Commands::Stdio => {
            let interactive = config
                .stdio_interactive
                .unwrap_or_else(|| std::io::stdin().is_terminal());
            info!(
                interactive,
                init_timeout_secs = config.stdio_init_timeout.as_secs(),
                "stdio transport starting"
            );

            serve_stdio(
                state.dispatcher,
                StdioOptions {
                    interactive,
                    init_timeout: config.stdio_init_timeout,
                },
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
    }

    Ok(())
}
