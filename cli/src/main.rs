use anyhow::Result;
use authz::Decision;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;
mod utils;

use commands::{check, config, permissions, AgentArgs};
use utils::settings::Settings;

/// Exit status when the checked operation is denied.
const EXIT_DENIED: i32 = 2;

/// Pod authorization CLI - Command line interface for inspecting access decisions
#[derive(Parser)]
#[command(name = "podctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "PODCTL_CONFIG",
        default_value = "podctl.yaml"
    )]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether an operation is allowed
    Check {
        /// HTTP method (GET, HEAD, OPTIONS, PUT, POST, DELETE, PATCH)
        method: String,

        /// Target URI or path relative to the base URL
        target: String,

        #[command(flatten)]
        agent: AgentArgs,

        /// Content type of the request body
        #[arg(long)]
        content_type: Option<String>,

        /// Normalized patch body as JSON ({"conditions":[],"deletes":[],"inserts":[]})
        #[arg(long)]
        patch: Option<String>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the permissions an agent holds on resources
    Permissions {
        /// Target URIs or paths relative to the base URL
        #[arg(required = true)]
        targets: Vec<String>,

        #[command(flatten)]
        agent: AgentArgs,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Output format (json, yaml)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let settings = match Settings::load(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            eprintln!(
                "{}",
                "Pass --config or set PODCTL_CONFIG to point at a podctl.yaml".yellow()
            );
            std::process::exit(1);
        }
    };

    // Execute the command
    match cli.command {
        Commands::Check {
            method,
            target,
            agent,
            content_type,
            patch,
            format,
        } => {
            let request = check::CheckRequest {
                method,
                target,
                agent,
                content_type,
                patch,
            };
            let decision = check::execute(&settings, request, format).await?;
            if decision != Decision::Allow {
                std::process::exit(EXIT_DENIED);
            }
        }
        Commands::Permissions {
            targets,
            agent,
            format,
        } => {
            permissions::execute(&settings, targets, agent, format).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                config::show(&settings, format).await?;
            }
        },
    }

    Ok(())
}
