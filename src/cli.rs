use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "stack-env-bootstrap", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write stack outputs and stage settings into the environment file
    Sync(SyncArgs),

    /// Create tables, buckets and the fixture user on local emulated endpoints
    BootstrapLocal(BootstrapLocalArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[arg(long = "appName", visible_alias = "app-name")]
    pub app_name: String,

    #[arg(long)]
    pub region: String,

    /// `local` targets the emulated endpoints and reads the `dev` stacks
    #[arg(long)]
    pub stage: String,

    /// Container registry the images are pushed to
    #[arg(long)]
    pub ecr: String,

    #[arg(long, default_value = ".env.sample")]
    pub sample: PathBuf,

    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    /// YAML file listing the stacks to read outputs from
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BootstrapLocalArgs {
    #[arg(long, value_enum, default_value_t = ResourceSource::Cloud)]
    pub source: ResourceSource,

    /// Consulted for required variables missing from the process environment
    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceSource {
    /// Mirror the tables and buckets listed by the deployed storage stack
    Cloud,
    /// Use the schema compiled into this tool
    Builtin,
}
