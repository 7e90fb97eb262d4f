mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Service broker operator tooling.
#[derive(Parser)]
#[command(name = "broker", version, about = "Service broker operator tooling")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the catalog of enabled services
    Catalog {
        /// Path to the broker configuration file
        #[arg(long)]
        config: PathBuf,
    },

    /// Validate a broker configuration file
    Check {
        /// Path to the broker configuration file
        #[arg(long)]
        config: PathBuf,
    },

    /// Show the variables a provision request would hand to the provider
    Params {
        /// Path to the broker configuration file
        #[arg(long)]
        config: PathBuf,
        /// Service ID to provision
        #[arg(long)]
        service: String,
        /// Plan ID to provision
        #[arg(long)]
        plan: String,
        /// Raw user parameters (JSON)
        #[arg(long)]
        parameters: Option<String>,
        /// Instance ID to merge into the variables
        #[arg(long, default_value = "dry-run")]
        instance_id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Catalog { config } => {
            commands::catalog::cmd_catalog(&config, cli.output, cli.quiet);
        }
        Commands::Check { config } => {
            commands::check::cmd_check(&config, cli.output, cli.quiet);
        }
        Commands::Params {
            config,
            service,
            plan,
            parameters,
            instance_id,
        } => {
            commands::params::cmd_params(
                &config,
                &service,
                &plan,
                parameters.as_deref(),
                &instance_id,
                cli.output,
                cli.quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
