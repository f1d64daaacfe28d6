//! CLI entry point for the Plaza dispatcher.
//!
//! Designed for subprocess invocation from the routing layer:
//! reads a JSON request envelope from stdin, writes `{"status", "body"}` to stdout.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use plaza_core::SchemaRegistry;
use plaza_dispatch::{Dispatcher, LogConfig, PlazaConfig, Request, Response};
use plaza_graph::GraphClient;

#[derive(Parser)]
#[command(name = "plaza-dispatch")]
#[command(about = "Schema-driven dispatcher for the Plaza property graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: plaza).
    #[arg(short, long, default_value = "plaza", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Handle one request envelope read from stdin.
    Dispatch,
    /// Print the registered entity schemas as JSON.
    Schema {
        /// Only this entity type.
        #[arg(long)]
        entity: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PlazaConfig::load(&cli.config)?;
    init_tracing(&config.log);

    match cli.command {
        Command::Dispatch => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let response = match serde_json::from_str::<Request>(&input) {
                Ok(request) => match GraphClient::connect(&config.neo4j).await {
                    Ok(graph) => {
                        Dispatcher::new(graph, config.dispatch.clone())
                            .respond(&request)
                            .await
                    }
                    Err(e) => Response::store_unavailable(e),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed request envelope");
                    Response::malformed(e)
                }
            };
            println!("{}", serde_json::to_string(&response)?);
        }
        Command::Schema { entity } => {
            let registry = SchemaRegistry::builtin();
            let output = match entity {
                Some(name) => serde_json::to_string_pretty(registry.get_schema(&name)?)?,
                None => serde_json::to_string_pretty(&registry.schemas())?,
            };
            println!("{output}");
        }
    }

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if log.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
