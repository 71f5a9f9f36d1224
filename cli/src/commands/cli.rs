use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskpilot", version, about = "Background automation daemon")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.taskpilot/config.toml, then ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides `queue.base_url`.
    #[arg(long, global = true)]
    pub queue_url: Option<String>,

    /// Overrides `daemon.max_parallel_tasks`.
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the queue until interrupted with Ctrl-C.
    Run,
    /// Run a single tick, wait for started tasks, then exit.
    Once,
    /// Render the prompt and command line for a task JSON file.
    Render(RenderArgs),
    /// Print a normalised command template and its compatibility warnings.
    CheckTemplate(CheckTemplateArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RenderArgs {
    #[arg(long)]
    pub task: PathBuf,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckTemplateArgs {
    /// Template to check instead of `templates.command` from the config.
    #[arg(long)]
    pub command: Option<String>,
}
