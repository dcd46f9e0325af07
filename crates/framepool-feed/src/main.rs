#![doc = include_str!("../README.md")]

mod feed;

use clap::Parser;
use feed::{
    config::{CliArgs, FeedConfig},
    detect::MarkerDetector,
    frame::FrameSource,
    histogram::FrameStats,
    pose::PoseEstimator,
    summary::{FeedSummary, StageStats},
    telemetry::init_telemetry,
};
use framepool::{Pipeline, PipelineExt, TokioRuntime, WorkerPool};
use std::{sync::Arc, time::Instant};
use tokio::{
    runtime::{Builder, Handle},
    time::{MissedTickBehavior, interval},
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = FeedConfig::try_from(args)?;

    init_telemetry(config.log_format)?;
    log_startup_info(&config);

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(config.runtime_threads)
        .thread_name("framepool-feed")
        .build()?;

    let summary = runtime.block_on(run(&config))?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

async fn run(config: &FeedConfig) -> anyhow::Result<FeedSummary> {
    let runtime = TokioRuntime::from_handle(Handle::current());

    let detector = WorkerPool::builder(
        runtime.clone(),
        MarkerDetector::new(config.latency, config.jitter),
    )
    .config(config.pool)
    .default_buffers()
    .build()?;
    let frame_stats = WorkerPool::builder(runtime.clone(), FrameStats)
        .config(config.pool)
        .default_buffers()
        .build()?;
    let pose = WorkerPool::builder(runtime, PoseEstimator::default())
        .config(config.pool)
        .default_buffers()
        .build()?;

    let graph = (&detector).diamond(&frame_stats).then(&pose);

    let mut source = FrameSource::new(
        config.width,
        config.height,
        config.markers,
        config.dropout,
        config.seed,
    );
    let mut ticker = interval(config.frame_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut summary = FeedSummary::default();
    let started = Instant::now();

    for _ in 0..config.frames {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                #[cfg(feature = "tracing")]
                tracing::info!("Received Ctrl+C signal, stopping capture");
                break;
            }
        }

        let frame = Arc::new(source.next_frame());
        let index = frame.index;
        graph.supply(frame);

        let estimate = graph.retrieve();
        summary.observe(index, &estimate);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Frame {index}: pose {:?} from frame {:?} (detector {:.0}% busy)",
            estimate.status,
            estimate.frame_index,
            detector.usage()
        );
    }
    let elapsed = started.elapsed();

    #[cfg(feature = "tracing")]
    tracing::info!("Capture finished, draining stages");

    let (detector_drained, stats_drained, pose_drained) = futures::future::join3(
        detector.shutdown(config.drain_timeout),
        frame_stats.shutdown(config.drain_timeout),
        pose.shutdown(config.drain_timeout),
    )
    .await;
    for (_stage, result) in [
        ("detector", detector_drained),
        ("frame stats", stats_drained),
        ("pose", pose_drained),
    ] {
        if let Err(_e) = result {
            #[cfg(feature = "tracing")]
            tracing::warn!("Stage {_stage} did not drain: {_e}");
        }
    }

    summary.finish(
        elapsed,
        StageStats {
            detector: detector.stats(),
            frame_stats: frame_stats.stats(),
            pose: pose.stats(),
        },
    );
    log_summary(&summary);

    Ok(summary)
}

fn log_startup_info(_config: &FeedConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting feed with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting feed: {} frames at {:?} intervals, {} workers per stage",
            _config.frames,
            _config.frame_period,
            _config.pool.max_workers
        );
    }
}

fn log_summary(_summary: &FeedSummary) {
    #[cfg(feature = "tracing")]
    {
        let s = _summary;
        tracing::info!(
            "{} frames in {} ms ({:.1} fps): pose updated={} last_known={} unavailable={}, lag mean={:.2} max={}",
            s.frames,
            s.elapsed_ms,
            s.effective_fps,
            s.pose.updated,
            s.pose.last_known,
            s.pose.unavailable,
            s.mean_lag_frames,
            s.max_lag_frames
        );
        for (stage, stats) in [
            ("detector", &s.stages.detector),
            ("frame stats", &s.stages.frame_stats),
            ("pose", &s.stages.pose),
        ] {
            tracing::info!("Stage {stage}: {stats:?}");
        }
    }
}
