//! Log output for the feed.
//!
//! Events are filtered through `RUST_LOG` (default `info`) and written by a
//! `tracing_subscriber::fmt` layer, either pretty-printed or as JSON lines.
//! Pool events from `framepool` itself show up under the same filter, e.g.
//! `RUST_LOG=info,framepool=debug` to watch stale results and overload.

use crate::feed::config::LogFormat;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt,
};

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_file(true)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_current_span(false),
            )
            .try_init()?,
    }

    Ok(())
}
