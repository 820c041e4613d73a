use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "orderdesk")]
#[command(about = "Detect the issuing company of scanned orders and generate work orders in batches")]
#[command(version)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long, env = "ORDERDESK_CONFIG", default_value = "orderdesk.yaml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a batch over files or directories
    Run(RunArgs),
    /// Detect the company of a single document
    Detect {
        /// Document to classify
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Files or directories to process
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Company used when auto-detection is off or finds nothing
    #[arg(long)]
    pub company: Option<String>,

    /// Skip company detection; requires --company
    #[arg(long)]
    pub no_auto_detect: bool,

    /// Files processed at once (capped at 3)
    #[arg(long, default_value = "1")]
    pub concurrency: usize,

    /// Pause the batch when a file fails. Ctrl-C resumes, twice cancels
    #[arg(long)]
    pub pause_on_error: bool,

    /// Retry failed files once at the end of the batch
    #[arg(long)]
    pub retry_failed: bool,
}

impl RunArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        if self.no_auto_detect && self.company.is_none() {
            anyhow::bail!("--company is required with --no-auto-detect");
        }
        Ok(())
    }
}
