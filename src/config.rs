//! Configuration types for fleet-dispatch
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use clap::error::ErrorKind;
use clap::Parser;
use std::ffi::OsString;
use std::time::Duration;

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Largest accepted coordinate bound
pub const MAX_COORDINATE_BOUND: i32 = 1_000_000;

/// Default job queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default result channel capacity
pub const DEFAULT_RESULT_CAPACITY: usize = 10;

/// Default pause between jobs
const DEFAULT_MIN_INTERVAL_MS: u64 = 500;
const DEFAULT_MAX_INTERVAL_MS: u64 = 2000;

/// Default grid half-width
const DEFAULT_COORDINATE_BOUND: i32 = 1000;

/// Ride dispatch simulator
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fleet-dispatch",
    version,
    about = "Ride dispatch simulator over bounded named message queues",
    long_about = "Generates random transport jobs at random intervals and hands them to a \
                  pool of drivers through a shared bounded queue. Each driver sleeps one \
                  millisecond per distance unit and reports back on its own channel.\n\n\
                  With DURATION the run ends gracefully after that many seconds; without it \
                  the run continues until interrupted.",
    after_help = "EXAMPLES:\n    \
        fleet-dispatch 4 10          # 4 drivers for 10 seconds\n    \
        fleet-dispatch 2             # 2 drivers until Ctrl-C\n    \
        fleet-dispatch 8 30 --queue-capacity 32 --min-interval-ms 50 --max-interval-ms 200"
)]
pub struct CliArgs {
    /// Number of drivers
    #[arg(value_name = "WORKERS")]
    pub workers: usize,

    /// Run time in seconds (runs until interrupted if omitted)
    #[arg(value_name = "DURATION")]
    pub duration: Option<u64>,

    /// Job queue capacity
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, value_name = "NUM")]
    pub queue_capacity: usize,

    /// Result channel capacity (per driver)
    #[arg(long, default_value_t = DEFAULT_RESULT_CAPACITY, value_name = "NUM")]
    pub result_capacity: usize,

    /// Shortest pause between jobs
    #[arg(long, default_value_t = DEFAULT_MIN_INTERVAL_MS, value_name = "MS")]
    pub min_interval_ms: u64,

    /// Longest pause between jobs
    #[arg(long, default_value_t = DEFAULT_MAX_INTERVAL_MS, value_name = "MS")]
    pub max_interval_ms: u64,

    /// Coordinates are drawn from [-BOUND, BOUND]
    #[arg(long, default_value_t = DEFAULT_COORDINATE_BOUND, value_name = "BOUND")]
    pub coord_bound: i32,

    /// Seed for reproducible job streams
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (per-job debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Parse command-line arguments
///
/// Help and version requests are printed by clap and end the process; any
/// other parse failure comes back as [`ConfigError::InvalidArguments`].
pub fn parse_args<I, T>(args: I) -> Result<CliArgs, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CliArgs::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => ConfigError::InvalidArguments {
            message: e
                .to_string()
                .lines()
                .next()
                .unwrap_or_default()
                .trim_start_matches("error: ")
                .to_string(),
        },
    })
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of drivers
    pub worker_count: usize,

    /// Run time; `None` runs until the shutdown flag is set externally
    pub run_for: Option<Duration>,

    /// Job queue capacity (K)
    pub queue_capacity: usize,

    /// Per-driver result channel capacity
    pub result_capacity: usize,

    /// Pause between jobs, inclusive range
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,

    /// Grid half-width
    pub coordinate_bound: i32,

    /// Random seed
    pub seed: Option<u64>,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl DispatchConfig {
    /// Defaults for `worker_count` drivers running until interrupted
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            run_for: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            coordinate_bound: DEFAULT_COORDINATE_BOUND,
            seed: None,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if let Some(secs) = args.duration {
            if secs == 0 {
                return Err(ConfigError::InvalidDuration { secs });
            }
        }

        let config = Self {
            worker_count: args.workers,
            run_for: args.duration.map(Duration::from_secs),
            queue_capacity: args.queue_capacity,
            result_capacity: args.result_capacity,
            min_interval_ms: args.min_interval_ms,
            max_interval_ms: args.max_interval_ms,
            coordinate_bound: args.coord_bound,
            seed: args.seed,
            show_progress: !args.quiet,
            verbose: args.verbose,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every bound; nothing has been created yet when this fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                queue: "job queue",
                capacity: self.queue_capacity,
            });
        }

        if self.result_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                queue: "result channel",
                capacity: self.result_capacity,
            });
        }

        if self.min_interval_ms > self.max_interval_ms {
            return Err(ConfigError::InvalidInterval {
                min: self.min_interval_ms,
                max: self.max_interval_ms,
            });
        }

        if !(0..=MAX_COORDINATE_BOUND).contains(&self.coordinate_bound) {
            return Err(ConfigError::InvalidCoordinateBound {
                bound: self.coordinate_bound,
                max: MAX_COORDINATE_BOUND,
            });
        }

        Ok(())
    }
}

/// Two-line usage text for argument errors
pub fn usage(program: &str) -> String {
    format!(
        "USAGE: {program} N [T]\n\
         N: 1 <= N <= {MAX_WORKERS} - number of drivers, T: 1 <= T - run time in seconds (omit to run until interrupted)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("fleet-dispatch").chain(list.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_parse_bounded_run() {
        let config = DispatchConfig::from_args(args(&["3", "5"])).unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.run_for, Some(Duration::from_secs(5)));
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.min_interval_ms, 500);
        assert_eq!(config.max_interval_ms, 2000);
        assert!(config.show_progress);
    }

    #[test]
    fn test_parse_indefinite_run() {
        let config = DispatchConfig::from_args(args(&["1", "-q"])).unwrap();
        assert_eq!(config.run_for, None);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert_eq!(
            DispatchConfig::from_args(args(&["0", "5"])).unwrap_err(),
            ConfigError::InvalidWorkerCount {
                count: 0,
                max: MAX_WORKERS
            }
        );
        assert_eq!(
            DispatchConfig::from_args(args(&["2", "0"])).unwrap_err(),
            ConfigError::InvalidDuration { secs: 0 }
        );
        assert!(matches!(
            DispatchConfig::from_args(args(&["2", "--queue-capacity", "0"])).unwrap_err(),
            ConfigError::InvalidCapacity { .. }
        ));
        assert!(matches!(
            DispatchConfig::from_args(args(&[
                "2",
                "--min-interval-ms",
                "10",
                "--max-interval-ms",
                "5"
            ]))
            .unwrap_err(),
            ConfigError::InvalidInterval { min: 10, max: 5 }
        ));
    }

    #[test]
    fn test_unparsable_arguments_are_config_errors() {
        for argv in [
            vec!["fleet-dispatch", "many"],
            vec!["fleet-dispatch"],
            vec!["fleet-dispatch", "2", "soon"],
            vec!["fleet-dispatch", "2", "--bogus"],
        ] {
            let err = parse_args(argv.clone()).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidArguments { ref message } if !message.is_empty()),
                "{argv:?}: {err:?}"
            );
            assert!(crate::error::DispatchError::from(err).is_usage());
        }
    }

    #[test]
    fn test_parse_args_accepts_valid_input() {
        let args = parse_args(["fleet-dispatch", "4", "10", "-q"]).unwrap();
        assert_eq!(args.workers, 4);
        assert_eq!(args.duration, Some(10));
        assert!(args.quiet);
    }

    #[test]
    fn test_usage_is_two_lines() {
        assert_eq!(usage("fleet-dispatch").lines().count(), 2);
    }
}
