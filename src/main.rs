use clap::{Parser, Subcommand};
use dotenv::dotenv;
use futures::StreamExt;
use std::path::PathBuf;

use wayfarer::adk::error::WayfarerError;
use wayfarer::wayfarer::config::AppConfig;
use wayfarer::wayfarer::server::{self, AppState, SnapshotView};
use wayfarer::wayfarer::workflow::graph::RunRequest;
use wayfarer::wayfarer::workflow::state::StateDelta;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Plan a trip from the command line, printing one JSON snapshot per step
    Run {
        /// What to plan, e.g. "3 days in Rome in May"
        #[arg(short, long)]
        task: String,

        /// Maximum number of workflow steps
        #[arg(short, long)]
        max_iterations: Option<usize>,

        /// Number of drafts to write before stopping
        #[arg(long)]
        max_revisions: Option<u32>,

        /// Stop after these nodes (comma separated)
        #[arg(long, value_delimiter = ',')]
        stop_after: Vec<String>,
    },
    /// Report which provider credentials are set
    Check,
}

#[tokio::main]
async fn main() -> Result<(), WayfarerError> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let state = AppState {
                engine: config.build_engine()?,
                max_iterations: config.workflow.max_iterations,
            };
            server::serve(&config.server.host, config.server.port, state).await?;
        }
        Commands::Run {
            task,
            max_iterations,
            max_revisions,
            stop_after,
        } => {
            let engine = config.build_engine()?;
            let request = RunRequest::new_thread(task)
                .with_input(StateDelta {
                    max_revisions,
                    ..Default::default()
                })
                .stop_after(stop_after)
                .max_iterations(max_iterations.unwrap_or(config.workflow.max_iterations));

            let stream = engine.run(request);
            tokio::pin!(stream);
            while let Some(item) = stream.next().await {
                let snapshot = item?;
                log::info!("Completed step {} ({:?})", snapshot.step, snapshot.last_node);
                println!("{}", serde_json::to_string(&SnapshotView::from(snapshot))?);
            }
        }
        Commands::Check => {
            let report = config.credential_report(|key| std::env::var(key).ok());
            println!("Model provider: {} ({})", config.model.provider, config.model_name());
            println!("Search provider: {:?}", config.search.provider);
            for status in &report {
                println!(
                    "{}: {} ({})",
                    status.variable,
                    if status.present { "set" } else { "not set" },
                    status.purpose
                );
            }

            let missing: Vec<&str> = report.iter().filter(|s| !s.present).map(|s| s.variable).collect();
            if !missing.is_empty() {
                return Err(WayfarerError::config(format!(
                    "missing credentials: {}",
                    missing.join(", ")
                )));
            }
        }
    }

    Ok(())
}
