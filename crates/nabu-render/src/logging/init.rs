use std::sync::Once;

/// Logger settings for the render crate and the application hosting it.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. "nabu_render=trace,wgpu=warn".
    /// Takes precedence over `RUST_LOG`.
    pub filter: Option<String>,
    /// Used when neither `filter` nor `RUST_LOG` is set.
    pub default_level: log::LevelFilter,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            default_level: log::LevelFilter::Info,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

fn filter_directives(config: &LoggingConfig, rust_log: Option<String>) -> String {
    config
        .filter
        .clone()
        .or(rust_log)
        .unwrap_or_else(|| config.default_level.to_string())
}

/// Installs `env_logger` as the global logger. Only the first call does
/// anything, and an already installed logger is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let directives = filter_directives(&config, std::env::var("RUST_LOG").ok());
        let installed = env_logger::Builder::new()
            .parse_filters(&directives)
            .write_style(config.write_style)
            .try_init()
            .is_ok();

        if installed {
            log::debug!("render logging initialized with {directives:?}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_beats_rust_log() {
        let config = LoggingConfig {
            filter: Some("nabu_render=trace".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(
            filter_directives(&config, Some("warn".into())),
            "nabu_render=trace"
        );
    }

    #[test]
    fn default_level_applies_without_any_filter() {
        let config = LoggingConfig {
            default_level: log::LevelFilter::Warn,
            ..LoggingConfig::default()
        };
        assert_eq!(filter_directives(&config, Some("debug".into())), "debug");
        assert_eq!(filter_directives(&config, None).to_lowercase(), "warn");
    }
}
