use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins when set; otherwise `default_level` (falling back to `info`).
pub fn init_tracing(service_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback_filter(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
            // .json() for log shipping
        )
        .init();

    tracing::info!("Starting service: {}", service_name);
}

fn fallback_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn configured_level_becomes_the_fallback_filter() {
        assert_eq!(fallback_filter("debug").max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(fallback_filter("warn").max_level_hint(), Some(LevelFilter::WARN));
    }
}
