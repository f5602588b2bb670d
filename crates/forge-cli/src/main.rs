//! Forge CLI
//!
//! Applies model-generated code to a project and inspects how the
//! pipeline sees it.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use forge_adapters::EnvironmentKind;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about = "Forge - streaming code synthesis and application", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Configuration file (defaults to forge.config.* in the project, then FORGE_HOME)
    #[arg(short, long, global = true, env = "FORGE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EnvArg {
    Local,
    DryRun,
    Memory,
}

impl From<EnvArg> for EnvironmentKind {
    fn from(arg: EnvArg) -> Self {
        match arg {
            EnvArg::Local => EnvironmentKind::Local,
            EnvArg::DryRun => EnvironmentKind::DryRun,
            EnvArg::Memory => EnvironmentKind::Memory,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a model response to the project
    Apply {
        /// Model output file, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Instruction that produced the response, used to classify the edit
        #[arg(short, long)]
        instruction: Option<String>,

        /// Input is JSON lines of stream events instead of raw text
        #[arg(long)]
        events: bool,

        /// Environment to apply to
        #[arg(short, long, value_enum, default_value = "local")]
        env: EnvArg,

        /// Print progress events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the files, packages and commands found in a model response
    Extract {
        /// Model output file, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Analyze the project and print its manifest
    Manifest {
        #[arg(long)]
        json: bool,
    },

    /// Classify a follow-up instruction against the project
    Classify {
        instruction: String,

        /// Also search file contents for these terms
        #[arg(short, long, num_args = 1..)]
        search: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default forge.config.yaml into the project
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose {
            "forge_cli=debug,forge_core=debug,forge_adapters=debug"
        } else {
            "forge_cli=info"
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!("Starting Forge CLI");

    let ctx = commands::Context {
        project: cli.project,
        config: cli.config,
    };

    let result = match cli.command {
        Commands::Apply {
            input,
            instruction,
            events,
            env,
            json,
        } => {
            commands::apply::run(
                &ctx,
                commands::apply::ApplyOptions {
                    input,
                    instruction,
                    events,
                    env: env.into(),
                    json,
                },
            )
            .await
        }
        Commands::Extract { input, json } => commands::extract::run(&ctx, &input, json).await,
        Commands::Manifest { json } => commands::manifest::run(&ctx, json).await,
        Commands::Classify {
            instruction,
            search,
            json,
        } => commands::classify::run(&ctx, &instruction, &search, json).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&ctx).await,
            ConfigAction::Init { force } => commands::config::init(&ctx, force).await,
            ConfigAction::Validate => commands::config::validate(&ctx).await,
        },
    };

    if let Err(ref e) = result {
        error!("Command failed: {:#}", e);
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    result
}
