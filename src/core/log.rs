use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const APP_TARGET: &str = "orca";

fn level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    }
}

/// Filter for this crate's own events. Store and runtime crates stay quiet.
fn app_targets(verbose: bool) -> Targets {
    Targets::new().with_target(APP_TARGET, level(verbose))
}

/// `RUST_LOG` when set, otherwise the verbosity default.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level(verbose).into()))
}

/// Installs the global subscriber. Logs go to stderr so tables on stdout stay clean.
pub fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time().with_writer(std::io::stderr))
        .with(app_targets(verbose))
        .with(env_filter(verbose))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_app_targets_follow_verbosity() {
        assert!(app_targets(true).would_enable("orca::fetchers::day", &Level::DEBUG));
        assert!(!app_targets(false).would_enable("orca::fetchers::day", &Level::ERROR));
        assert!(!app_targets(true).would_enable("fjall", &Level::DEBUG));
    }
}
