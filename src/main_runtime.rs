use digit_ledger::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "digit-ledger.log";

/// Directives used when `RUST_LOG` is unset
pub fn default_directives(level: &str) -> String {
    if level.eq_ignore_ascii_case("info") {
        "info,digit_ledger=debug,sqlx=warn".to_string()
    } else {
        format!("{level},sqlx=warn")
    }
}

pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&logging.level)));

    // `rolling::daily` panics if the first file cannot be created, so check writability first.
    let file_layer = logging.dir.as_ref().and_then(|dir| {
        let probe = dir.join(".digit_ledger_write_test");
        let writable = std::fs::create_dir_all(dir)
            .and_then(|_| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&probe)
            })
            .map(|_| {
                let _ = std::fs::remove_file(&probe);
            });

        match writable {
            Ok(()) => {
                let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE);
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives for the rest of the process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!logging.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, &logging.dir) {
        eprintln!("Logging to: {}/{}", dir.display(), LOG_FILE);
    }
}
