//! Run settings: CLI flags over an optional YAML config file over defaults.

use crate::cli::Cli;
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const CONFIG_ENV: &str = "PRISM_CONFIG";
const DEFAULT_PROGRESS_EVERY: u64 = 100;

/// Keys accepted in a `prism.yaml` config file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub jobs: Option<usize>,
    pub max_preprocessed: Option<usize>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub progress_every: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub jobs: usize,
    pub max_preprocessed: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub progress: bool,
    pub progress_every: u64,
    pub timeout: Option<Duration>,
}

impl RunSettings {
    /// Merge CLI flags over the config file. Glob lists from the CLI replace,
    /// rather than extend, the file's lists.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let include = if cli.include.is_empty() {
            file.include
        } else {
            cli.include.clone()
        };
        let exclude = if cli.exclude.is_empty() {
            file.exclude
        } else {
            cli.exclude.clone()
        };

        Self {
            jobs: cli.jobs.or(file.jobs).unwrap_or_else(default_jobs),
            max_preprocessed: cli.max_preprocessed.or(file.max_preprocessed).unwrap_or(0),
            include,
            exclude,
            progress: cli.progress,
            progress_every: file.progress_every.unwrap_or(DEFAULT_PROGRESS_EVERY),
            timeout: cli
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs),
        }
    }
}

fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Resolve the config file from `--config` or `$PRISM_CONFIG`.
pub fn config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    config_path_from_env(cli_path, |key| std::env::var(key).ok())
}

fn config_path_from_env<F>(cli_path: Option<&Path>, get_env: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    get_env(CONFIG_ENV)
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

pub fn load(path: &Path) -> Result<FileConfig, String> {
    let text = fs::read_to_string(path)
        .map_err(|error| format!("failed to read config '{}': {error}", path.display()))?;
    parse(&text).map_err(|error| format!("{}: {error}", path.display()))
}

pub fn parse(text: &str) -> Result<FileConfig, String> {
    if text.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(text).map_err(|error| format!("invalid config: {error}"))
}
