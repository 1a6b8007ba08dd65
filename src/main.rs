//! Argus demo binary: fetch the latest frame from an RTSP camera once a
//! second and report capture-to-fetch latency.

use argus::SessionConfig;
use color_eyre::Result;
use tracing::info;

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("argus=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Argus launching...");

    let config = load_config()?;
    run(config)
}

/// Configuration comes from `argus.toml`, `ARGUS_*` environment overrides,
/// and an optional endpoint on the command line - in rising precedence.
fn load_config() -> Result<SessionConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::File::with_name("argus").required(false))
        .add_source(config::Environment::with_prefix("ARGUS"));

    if let Some(endpoint) = std::env::args().nth(1) {
        builder = builder.set_override("endpoint", endpoint)?;
    }

    let config = builder.build()?.try_deserialize()?;
    Ok(config)
}

#[cfg(feature = "gst-source")]
fn run(config: SessionConfig) -> Result<()> {
    use argus::GstSource;
    use std::time::Duration;

    let source = GstSource::new()?;
    let fetch = argus::run_nonblocking(source, config)?;

    loop {
        let frame = fetch.fetch()?;
        let stats = fetch.stats();
        info!(
            "frame {} ({}x{} {:?}) latency {:?} | delivered {} discarded {} reconnects {}",
            frame.meta.sequence,
            frame.meta.width,
            frame.meta.height,
            frame.meta.format,
            frame.age(),
            stats.delivered,
            stats.discarded,
            stats.reconnects,
        );
        std::thread::sleep(Duration::from_secs(1));
    }
}

#[cfg(not(feature = "gst-source"))]
fn run(_config: SessionConfig) -> Result<()> {
    use color_eyre::eyre::eyre;

    Err(eyre!(
        "argus was built without a stream backend; rebuild with --features gst-source"
    ))
}
