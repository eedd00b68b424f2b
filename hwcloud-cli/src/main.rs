//! `hwcloud`: manage HuaweiCloud resources from a Terraform-style JSON configuration
//!
//! Resources are applied one at a time in reference order and the state file is
//! rewritten after every successful operation, so an interrupted run loses nothing
//! that already happened remotely.

mod commands;
mod configuration;
mod lint;
mod references;
mod schema_doc;
mod state_store;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use commands::Session;

#[derive(Parser)]
#[command(name = "hwcloud")]
#[command(about = "Plan, apply and destroy HuaweiCloud resources", long_about = None)]
struct Cli {
    /// Path to the JSON configuration
    #[arg(short, long, global = true, default_value = "main.tf.json")]
    config: PathBuf,

    /// Path to the JSON state file
    #[arg(short, long, global = true, default_value = "hwcloud.tfstate.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan,
    /// Create, update or replace resources to match the configuration
    Apply,
    /// Destroy every resource in the state file
    Destroy,
    /// Re-read resources and drop the ones that no longer exist
    Refresh,
    /// Adopt an existing object into state
    Import {
        /// Resource address, e.g. huaweicloud_vpc.main
        address: String,
        /// Import ID of the remote object
        id: String,
    },
    /// Print registered resource and data source schemas
    Schema {
        /// Resource type, or data.<type> for a data source
        type_name: Option<String>,
    },
    /// Report resource read handlers that don't call check_deleted
    Lint {
        /// Source directory to scan
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Schema { type_name } => commands::schema(type_name.as_deref()).map(|()| true),
        Commands::Lint { dir } => commands::lint(&dir),
        command => {
            let mut session = Session::open(&cli.config, &cli.state).await?;
            match command {
                Commands::Plan => session.plan().await?,
                Commands::Apply => session.apply().await?,
                Commands::Destroy => session.destroy().await?,
                Commands::Refresh => session.refresh().await?,
                Commands::Import { address, id } => session.import(&address, &id).await?,
                Commands::Schema { .. } | Commands::Lint { .. } => {}
            }
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries plan and schema output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
