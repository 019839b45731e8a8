//! Configuration types for link-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - A builder for library callers that skip the CLI

use crate::error::ConfigError;
use crate::walker::dedup::DEFAULT_SHARDS;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum concurrency limit
const MAX_CONCURRENCY: usize = 512;

/// Maximum worker thread count
const MAX_WORKERS: usize = 512;

/// Minimum queue size
const MIN_QUEUE_SIZE: usize = 8;

/// Default queue size
const DEFAULT_QUEUE_SIZE: usize = 10_000;

/// Maximum dedup shard count
const MAX_SHARDS: usize = 1024;

/// Default interval for re-checking cancellation while blocked
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded-concurrency graph walker
#[derive(Parser, Debug, Clone)]
#[command(
    name = "link-walker",
    version,
    about = "Visit every task reachable from a seed, at most N expansions at a time",
    long_about = "Walks a graph breadth-first-ish from a starting task, expanding each task \
                  exactly once with a bounded number of concurrent expansions.\n\n\
                  Without --graph the graph is the local directory tree rooted at START.\n\
                  With --graph FILE the graph is an adjacency list ('node: child child').",
    after_help = "EXAMPLES:\n    \
        link-walker /srv/data -d 4 -c 16\n    \
        link-walker /home --exclude '\\.git$' --timeout-ms 2000\n    \
        link-walker A --graph links.txt -c 2 --list"
)]
pub struct CliArgs {
    /// Seed task (directory path, or node name with --graph)
    #[arg(value_name = "START")]
    pub start: String,

    /// Adjacency-list file to walk instead of the filesystem
    #[arg(short = 'g', long, value_name = "FILE")]
    pub graph: Option<PathBuf>,

    /// Maximum traversal depth (0 = seed only)
    #[arg(short = 'd', long, default_value = "3", value_name = "NUM")]
    pub max_depth: u32,

    /// Maximum simultaneous expansions
    #[arg(
        short = 'c',
        long,
        default_value_t = default_concurrency(),
        value_name = "NUM"
    )]
    pub concurrency: usize,

    /// Worker threads (defaults to the concurrency limit)
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Task queue size (controls memory usage)
    #[arg(long, default_value_t = DEFAULT_QUEUE_SIZE, value_name = "NUM")]
    pub queue_size: usize,

    /// Visited-set shards (power of two)
    #[arg(long, default_value_t = DEFAULT_SHARDS, value_name = "NUM")]
    pub shards: usize,

    /// Wall-clock budget for the whole walk in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Exclude task ids matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Also visit regular files (filesystem mode)
    #[arg(long)]
    pub files: bool,

    /// Follow symbolic links to directories (filesystem mode)
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Artificial delay per expansion in milliseconds (graph mode)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Print every visited id after the walk
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show task errors)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_concurrency() -> usize {
    // Expansions are usually I/O bound
    (num_cpus::get() * 2).min(MAX_CONCURRENCY)
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Maximum traversal depth
    pub max_depth: u32,

    /// Concurrency gate capacity
    pub max_concurrency: usize,

    /// Number of worker threads
    pub worker_count: usize,

    /// Task queue capacity
    pub queue_size: usize,

    /// Dedup store shards
    pub shard_count: usize,

    /// Wall-clock budget for the run
    pub deadline: Option<Duration>,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Longest a blocked wait goes without checking cancellation
    pub poll_interval: Duration,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkConfig {
    /// Configuration with defaults for everything but the two required limits
    pub fn new(max_depth: u32, max_concurrency: usize) -> Self {
        Self {
            max_depth,
            max_concurrency,
            worker_count: max_concurrency,
            queue_size: DEFAULT_QUEUE_SIZE,
            shard_count: DEFAULT_SHARDS,
            deadline: None,
            exclude_patterns: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            show_progress: false,
            verbose: false,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shard_count = shards;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Add exclude patterns, compiling each one
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidExcludePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            self.exclude_patterns.push(re);
        }
        Ok(self)
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::new(args.max_depth, args.concurrency)
            .with_workers(args.workers.unwrap_or(args.concurrency))
            .with_queue_size(args.queue_size)
            .with_shards(args.shards)
            .with_excludes(&args.exclude_patterns)?;

        config.deadline = args.timeout_ms.map(Duration::from_millis);
        config.show_progress = !args.quiet;
        config.verbose = args.verbose;

        config.validate()?;
        Ok(config)
    }

    /// Check every limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::InvalidConcurrency {
                value: self.max_concurrency,
                max: MAX_CONCURRENCY,
            });
        }

        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        if self.queue_size < MIN_QUEUE_SIZE {
            return Err(ConfigError::InvalidQueueSize {
                size: self.queue_size,
                min: MIN_QUEUE_SIZE,
            });
        }

        if self.shard_count == 0
            || self.shard_count > MAX_SHARDS
            || !self.shard_count.is_power_of_two()
        {
            return Err(ConfigError::InvalidShardCount {
                count: self.shard_count,
                max: MAX_SHARDS,
            });
        }

        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidDeadline);
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }

        Ok(())
    }

    /// Check if a task id should be excluded
    pub fn is_excluded(&self, id: &str) -> bool {
        self.exclude_patterns.iter().any(|re| re.is_match(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["link-walker", "/data"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = WalkConfig::new(3, 4);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.queue_size, DEFAULT_QUEUE_SIZE);
        assert_eq!(config.shard_count, DEFAULT_SHARDS);
        assert!(config.deadline.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_args() {
        let config = WalkConfig::from_args(&args(&[
            "-d", "5", "-c", "8", "-w", "2", "--timeout-ms", "250", "-q",
        ]))
        .unwrap();

        assert_eq!(config.max_depth, 5);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.deadline, Some(Duration::from_millis(250)));
        assert!(!config.show_progress);
    }

    #[test]
    fn test_workers_default_to_concurrency() {
        let config = WalkConfig::from_args(&args(&["-c", "6"])).unwrap();
        assert_eq!(config.worker_count, 6);
    }

    #[test]
    fn test_invalid_concurrency() {
        assert!(matches!(
            WalkConfig::new(1, 0).validate(),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
        assert!(matches!(
            WalkConfig::new(1, MAX_CONCURRENCY + 1).validate(),
            Err(ConfigError::InvalidConcurrency { .. })
        ));
    }

    #[test]
    fn test_invalid_limits() {
        assert!(matches!(
            WalkConfig::new(1, 1).with_workers(0).validate(),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));
        assert!(matches!(
            WalkConfig::new(1, 1).with_queue_size(2).validate(),
            Err(ConfigError::InvalidQueueSize { .. })
        ));
        assert!(matches!(
            WalkConfig::new(1, 1).with_shards(3).validate(),
            Err(ConfigError::InvalidShardCount { .. })
        ));
        assert!(matches!(
            WalkConfig::new(1, 1).with_deadline(Duration::ZERO).validate(),
            Err(ConfigError::InvalidDeadline)
        ));
        assert!(matches!(
            WalkConfig::new(1, 1).with_poll_interval(Duration::ZERO).validate(),
            Err(ConfigError::InvalidPollInterval)
        ));
    }

    #[test]
    fn test_exclude_pattern() {
        let config = WalkConfig::new(3, 2)
            .with_excludes([r"\.snapshot", r"^http://ads\."])
            .unwrap();

        assert!(config.is_excluded("/data/.snapshot/hourly.0"));
        assert!(config.is_excluded("http://ads.example.com/x"));
        assert!(!config.is_excluded("/data/myfile.txt"));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let err = WalkConfig::new(3, 2).with_excludes(["(unclosed"]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExcludePattern { .. }));
    }
}
