//! Courier MCP server — entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use courier_mcp::builtin::register_builtins;
use courier_mcp::config::{load_config, TransportKind};
use courier_mcp::protocol::ServerBuilder;
use courier_mcp::transport::StdioTransport;
use courier_mcp::types::Capabilities;

#[derive(Parser)]
#[command(
    name = "courier-mcp",
    about = "Capability-negotiated MCP server over stdio or streamable HTTP",
    version
)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server on the configured transport (default).
    Serve {
        /// Configuration file path.
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Start the server over streamable HTTP.
    #[cfg(feature = "http")]
    ServeHttp {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,

        /// Run without session identity or push notifications.
        #[arg(long)]
        stateless: bool,

        /// Idle-session timeout in seconds (stateful mode); overrides config.
        #[arg(long)]
        idle_timeout: Option<u64>,

        /// Configuration file path.
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print server identity, capabilities, and registered primitives.
    Info,
}

fn build_handler(config: &courier_mcp::ServerConfig) -> anyhow::Result<courier_mcp::ProtocolHandler> {
    let mut builder = ServerBuilder::new(config.name.clone(), config.version.clone());
    if let Some(size) = config.page_size {
        builder = builder.page_size(size);
    }
    let handler = builder.build();
    register_builtins(&handler)?;
    Ok(handler)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol traffic; logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Serve { config: None }) {
        Commands::Serve { config } => {
            let config = load_config(config.or(cli.config).as_deref())?;
            let handler = Arc::new(build_handler(&config)?);
            match config.transport {
                TransportKind::Stdio => {
                    StdioTransport::new(handler)
                        .buffer(config.notification_buffer)
                        .run()
                        .await?;
                }
                TransportKind::Http => {
                    #[cfg(feature = "http")]
                    {
                        use courier_mcp::transport::HttpTransport;

                        let transport = if config.http.stateful {
                            HttpTransport::stateful(
                                handler,
                                std::time::Duration::from_secs(config.http.idle_timeout_secs),
                            )
                        } else {
                            HttpTransport::stateless(handler)
                        };
                        transport
                            .buffer(config.notification_buffer)
                            .run(&config.http.bind)
                            .await?;
                    }
                    #[cfg(not(feature = "http"))]
                    anyhow::bail!(
                        "configuration selects the http transport, but this binary was built without the `http` feature"
                    );
                }
            }
        }

        #[cfg(feature = "http")]
        Commands::ServeHttp {
            addr,
            stateless,
            idle_timeout,
            config,
        } => {
            use courier_mcp::transport::HttpTransport;

            let config = load_config(config.or(cli.config).as_deref())?;
            let handler = Arc::new(build_handler(&config)?);
            let transport = if stateless || !config.http.stateful {
                HttpTransport::stateless(handler)
            } else {
                let secs = idle_timeout.unwrap_or(config.http.idle_timeout_secs);
                HttpTransport::stateful(handler, std::time::Duration::from_secs(secs))
            };
            transport.buffer(config.notification_buffer).run(&addr).await?;
        }

        Commands::Info => {
            let config = load_config(cli.config.as_deref())?;
            let handler = build_handler(&config)?;
            let info = serde_json::json!({
                "server": { "name": config.name, "version": config.version },
                "protocol_version": courier_mcp::types::PROTOCOL_VERSION,
                "capabilities": Capabilities::server_default(),
                "tools": handler.tools().list().iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
                "prompts": handler.prompts().list().iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
                "resources": handler.resources().list().iter().map(|r| r.uri.clone()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}
