use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "appbox")]
#[command(about = "Build and launch a single-process application image")]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build an image from a recipe
    Build(BuildArgs),
    /// Launch a built image in the foreground
    Run(RunArgs),
    /// Build, then launch
    Up {
        #[command(flatten)]
        build: BuildArgs,
        /// Override an environment variable at start time (NAME=VALUE)
        #[arg(short = 'e', long = "env", value_parser = parse_env_override)]
        env: Vec<(String, String)>,
    },
    /// Print the metadata of a built image
    Inspect {
        /// Image directory
        #[arg(short, long, default_value = crate::config::recipe::DEFAULT_OUTPUT)]
        image: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Path to the recipe file
    #[arg(short = 'f', long = "file", default_value = "appbox.toml")]
    pub recipe: PathBuf,

    /// Override the image output directory from the recipe
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show the build plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Image directory
    #[arg(short, long, default_value = crate::config::recipe::DEFAULT_OUTPUT)]
    pub image: PathBuf,

    /// Override an environment variable at start time (NAME=VALUE)
    #[arg(short = 'e', long = "env", value_parser = parse_env_override)]
    pub env: Vec<(String, String)>,
}

pub fn parse_env_override(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    crate::utils::validation::validate_env_name("env", name).map_err(|e| e.to_string())?;
    Ok((name.to_string(), value.to_string()))
}
