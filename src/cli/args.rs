use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prism", version)]
pub struct Cli {
    /// JSONL manifest file (default: stdin)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Number of worker threads (default: CPU count; 0 is treated as 1)
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Records allowed in flight at once, hashing or awaiting output (default: --jobs)
    #[arg(long, value_name = "N")]
    pub max_preprocessed: Option<usize>,

    /// Only hash paths matching this glob (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Skip paths matching this glob (repeatable; wins over --include)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Stop claiming new records after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Emit progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// YAML config file (default: $PRISM_CONFIG)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print operator.json and exit
    #[arg(long)]
    pub describe: bool,

    /// Print JSON Schema and exit
    #[arg(long)]
    pub schema: bool,
}
