use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化日誌；`RUST_LOG` 優先於 `level`
pub fn init_logger(verbose: bool, level: Option<&str>, json: bool) {
    let default_directive = match (verbose, level) {
        (true, _) => "service_geocoder=debug,info".to_string(),
        (false, Some(level)) => format!("service_geocoder={}", level),
        (false, None) => "service_geocoder=info".to_string(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .json(),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .init();
    }
}
