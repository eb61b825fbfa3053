use std::sync::Once;

/// Used when neither the config nor `RUST_LOG` provides a filter.
///
/// wgpu and naga are chatty at `info`, so they are held at `warn`.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "lumen_engine=debug,wgpu_core=warn").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Picks the filter string: explicit config, then `RUST_LOG`, then [`DEFAULT_FILTER`].
/// Blank values count as unset.
fn resolve_filter(config: &LoggingConfig, env: Option<String>) -> String {
    let set = |f: &String| !f.trim().is_empty();
    config
        .env_filter
        .clone()
        .filter(set)
        .or(env.filter(set))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Initializes the global logger once; later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(&config, std::env::var("RUST_LOG").ok());

        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&filter);
        builder.write_style(config.write_style);

        if let Err(err) = builder.try_init() {
            eprintln!("logger already installed: {err}");
            return;
        }

        log::debug!("logging initialized with filter `{filter}`");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_filter_wins_over_env() {
        let config = LoggingConfig {
            env_filter: Some("debug".into()),
            ..Default::default()
        };
        assert_eq!(resolve_filter(&config, Some("trace".into())), "debug");
    }

    #[test]
    fn env_filter_used_without_config() {
        assert_eq!(
            resolve_filter(&LoggingConfig::default(), Some("warn".into())),
            "warn"
        );
    }

    #[test]
    fn blank_filters_fall_back_to_default() {
        assert_eq!(resolve_filter(&LoggingConfig::default(), None), DEFAULT_FILTER);
        assert_eq!(
            resolve_filter(&LoggingConfig::default(), Some("  ".into())),
            DEFAULT_FILTER
        );
    }

    #[test]
    fn blank_config_filter_defers_to_env() {
        let config = LoggingConfig {
            env_filter: Some("  ".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(resolve_filter(&config, Some("warn".into())), "warn");
        assert_eq!(resolve_filter(&config, None), DEFAULT_FILTER);
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::default());
    }
}
