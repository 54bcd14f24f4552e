use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, filtered by `LEARN_LOG` (default `info`).
///
/// Logs go to stderr so they never interleave with drill prompts on stdout.
pub fn init_tracing() {
    let level = std::env::var("LEARN_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
