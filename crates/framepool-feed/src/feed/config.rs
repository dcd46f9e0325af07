use crate::feed::frame::{MARKER_SIZE, max_markers};
use anyhow::bail;
use clap::{Parser, ValueEnum};
use framepool::{FailurePolicy, PoolConfig};
use std::time::Duration;

/// Output format of the log subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Runtime configuration for the `framepool-feed` binary.
///
/// Every knob can be given on the command line or through the environment
/// (including a `.env` file in the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "framepool-feed",
    version,
    about = "Feeds a synthetic camera stream through framepool worker pools"
)]
pub struct CliArgs {
    /// Number of frames to capture before shutting down.
    ///
    /// Environment variable: `FRAMES`
    #[arg(long, env = "FRAMES", default_value_t = 300)]
    pub frames: u64,

    /// Capture rate in frames per second.
    ///
    /// Environment variable: `FPS`
    #[arg(long, env = "FPS", default_value_t = 30)]
    pub fps: u32,

    /// Frame width in pixels.
    ///
    /// Environment variable: `FRAME_WIDTH`
    #[arg(long, env = "FRAME_WIDTH", default_value_t = 320)]
    pub width: usize,

    /// Frame height in pixels.
    ///
    /// Environment variable: `FRAME_HEIGHT`
    #[arg(long, env = "FRAME_HEIGHT", default_value_t = 240)]
    pub height: usize,

    /// Markers rendered into every frame.
    ///
    /// Environment variable: `MARKERS_PER_FRAME`
    #[arg(long, env = "MARKERS_PER_FRAME", default_value_t = 4)]
    pub markers: usize,

    /// Probability that a frame shows no marker at all (occlusion).
    ///
    /// Environment variable: `DROPOUT_RATE`
    #[arg(long, env = "DROPOUT_RATE", default_value_t = 0.1)]
    pub dropout: f64,

    /// Upper bound on concurrent jobs per stage.
    ///
    /// Environment variable: `MAX_WORKERS`
    #[arg(long, env = "MAX_WORKERS", default_value_t = PoolConfig::DEFAULT_MAX_WORKERS)]
    pub max_workers: usize,

    /// Per-job timeout in milliseconds. Jobs running longer are cancelled
    /// and their output discarded.
    ///
    /// Environment variable: `JOB_TIMEOUT_MS`
    #[arg(long, env = "JOB_TIMEOUT_MS", default_value_t = 1000)]
    pub job_timeout_ms: u64,

    /// Keep the partial output of failed jobs.
    ///
    /// Environment variable: `RETAIN_FAILED`
    #[arg(long, env = "RETAIN_FAILED", default_value_t = false)]
    pub retain_failed: bool,

    /// Simulated detection backend latency in milliseconds.
    ///
    /// Environment variable: `DETECTOR_LATENCY_MS`
    #[arg(long, env = "DETECTOR_LATENCY_MS", default_value_t = 40)]
    pub latency_ms: u64,

    /// Random extra latency in milliseconds, drawn uniformly per job.
    ///
    /// Environment variable: `DETECTOR_JITTER_MS`
    #[arg(long, env = "DETECTOR_JITTER_MS", default_value_t = 60)]
    pub jitter_ms: u64,

    /// How long to wait for in-flight jobs at shutdown, in milliseconds.
    ///
    /// Environment variable: `DRAIN_TIMEOUT_MS`
    #[arg(long, env = "DRAIN_TIMEOUT_MS", default_value_t = 3000)]
    pub drain_timeout_ms: u64,

    /// Tokio worker threads. Defaults to the number of CPUs.
    ///
    /// Environment variable: `RUNTIME_THREADS`
    #[arg(long, env = "RUNTIME_THREADS")]
    pub runtime_threads: Option<usize>,

    /// Seed of the frame generator. Random when unset.
    ///
    /// Environment variable: `SEED`
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Log output format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Print the final summary as JSON on stdout.
    ///
    /// Environment variable: `SUMMARY_JSON`
    #[arg(long, env = "SUMMARY_JSON", default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub frames: u64,
    pub frame_period: Duration,
    pub width: usize,
    pub height: usize,
    pub markers: usize,
    pub dropout: f64,
    pub pool: PoolConfig,
    pub latency: Duration,
    pub jitter: Duration,
    pub drain_timeout: Duration,
    pub runtime_threads: usize,
    pub seed: u64,
    pub log_format: LogFormat,
    pub json: bool,
}

impl TryFrom<CliArgs> for FeedConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.fps == 0 {
            bail!("FPS must be greater than 0");
        }
        let frame_period = Duration::from_secs(1) / args.fps;
        if frame_period.is_zero() {
            bail!("FPS ({}) is too high for a nanosecond frame period", args.fps);
        }

        if args.width < MARKER_SIZE * 2 || args.height < MARKER_SIZE * 2 {
            bail!(
                "Frames must be at least {0}x{0} pixels (got {1}x{2})",
                MARKER_SIZE * 2,
                args.width,
                args.height
            );
        }

        let capacity = max_markers(args.width, args.height);
        if args.markers > capacity {
            bail!(
                "MARKERS_PER_FRAME ({}) does not fit a {}x{} frame (max = {})",
                args.markers,
                args.width,
                args.height,
                capacity
            );
        }

        if !(0.0..=1.0).contains(&args.dropout) {
            bail!("DROPOUT_RATE must be within [0, 1] (got {})", args.dropout);
        }

        let pool = PoolConfig {
            max_workers: args.max_workers,
            job_timeout: Duration::from_millis(args.job_timeout_ms),
            failure_policy: if args.retain_failed {
                FailurePolicy::Retain
            } else {
                FailurePolicy::Discard
            },
        };
        pool.validate()?;

        let runtime_threads = args.runtime_threads.unwrap_or_else(num_cpus::get);
        if runtime_threads == 0 {
            bail!("RUNTIME_THREADS must be greater than 0");
        }

        Ok(Self {
            frames: args.frames,
            frame_period,
            width: args.width,
            height: args.height,
            markers: args.markers,
            dropout: args.dropout,
            pool,
            latency: Duration::from_millis(args.latency_ms),
            jitter: Duration::from_millis(args.jitter_ms),
            drain_timeout: Duration::from_millis(args.drain_timeout_ms),
            runtime_threads,
            seed: args.seed.unwrap_or_else(rand::random),
            log_format: args.log_format,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<FeedConfig> {
        let args = CliArgs::try_parse_from(std::iter::once("framepool-feed").chain(args.iter().copied()))?;
        FeedConfig::try_from(args)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&["--seed", "7", "--runtime-threads", "2"]).unwrap();
        assert_eq!(config.frames, 300);
        assert_eq!(config.frame_period, Duration::from_secs(1) / 30);
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.seed, 7);
        assert_eq!(config.runtime_threads, 2);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--max-workers",
            "2",
            "--job-timeout-ms",
            "250",
            "--retain-failed",
            "--log-format",
            "json",
            "--json",
        ])
        .unwrap();
        assert_eq!(config.pool.max_workers, 2);
        assert_eq!(config.pool.job_timeout, Duration::from_millis(250));
        assert_eq!(config.pool.failure_policy, FailurePolicy::Retain);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.json);
    }

    #[test]
    fn highest_fps_keeps_a_nonzero_period() {
        let config = parse(&["--fps", "1000000000", "--seed", "1"]).unwrap();
        assert_eq!(config.frame_period, Duration::from_nanos(1));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(parse(&["--fps", "0"]).is_err());
        assert!(parse(&["--fps", "2000000000"]).is_err());
        assert!(parse(&["--max-workers", "0"]).is_err());
        assert!(parse(&["--job-timeout-ms", "0"]).is_err());
        assert!(parse(&["--width", "4"]).is_err());
        assert!(parse(&["--markers", "100000"]).is_err());
        assert!(parse(&["--dropout", "1.5"]).is_err());
        assert!(parse(&["--runtime-threads", "0"]).is_err());
    }
}
