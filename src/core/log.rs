use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Installs the global subscriber. Output goes to stderr so that tables and
/// JSON on stdout stay clean; nothing is logged unless `verbose` is set or
/// `RUST_LOG` asks for it.
pub fn init_logging(verbose: bool) {
    let (app_level, default_directive) = if verbose {
        (LevelFilter::DEBUG, "navcast=debug,warn")
    } else {
        (LevelFilter::OFF, "off")
    };
    let app_filter = Targets::new()
        .with_target("navcast", app_level)
        .with_default(LevelFilter::WARN);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(app_filter)
        .with(env_filter)
        .init();
}
