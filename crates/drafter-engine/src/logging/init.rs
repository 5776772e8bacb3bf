use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "drafter_engine=debug,wgpu=warn"). When unset, `RUST_LOG` is consulted,
/// then `default_level`.
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture.
    pub is_test: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

impl LoggingConfig {
    /// Debug-level config for unit tests.
    pub fn for_tests() -> Self {
        Self {
            default_level: log::LevelFilter::Debug,
            is_test: true,
            ..Self::default()
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(config.default_level);
        }

        builder.write_style(config.write_style);
        builder.is_test(config.is_test);

        // Another logger may already be installed (e.g. by a test harness).
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
