use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    BackoffConfig, Config, DispatchConfig, ExchangeConfig, LoggingConfig, RegistryConfig,
};

/// Prefix of environment overrides, e.g. `TANDEM__DISPATCH__MAX_IN_FLIGHT=2`.
pub const ENV_PREFIX: &str = "TANDEM";

/// Loads the application configuration.
///
/// Reads `path` when given (it must exist), otherwise an optional
/// `config.toml` in the working directory, then applies `TANDEM__*`
/// environment overrides, deserializes into our strongly-typed `Config` and
/// validates it.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name("config.toml").required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let file = write_toml(
            r#"
            [dispatch]
            max_in_flight = 2

            [dispatch.backoff]
            min_backoff_ms = 250
            "#,
        );
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.dispatch.max_in_flight, 2);
        assert_eq!(config.dispatch.requests_per_window, 25);
        assert_eq!(config.dispatch.backoff.min_backoff(), Duration::from_millis(250));
        assert_eq!(config.dispatch.backoff.max_backoff(), Duration::from_secs(3600));
        assert_eq!(config.dispatch.backoff.max_hint(), Duration::from_secs(604_800));
        assert_eq!(config.exchange.request_life(), Duration::from_secs(5));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_concurrency_ceiling_is_rejected() {
        let file = write_toml("[dispatch]\nmax_in_flight = 0\n");
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let file = write_toml("[dispatch.backoff]\nmin_backoff_ms = 10000\nmax_backoff_secs = 1\n");
        assert!(matches!(
            load_config(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn shrinking_multiplier_is_rejected() {
        let mut config = Config::default();
        config.dispatch.backoff.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = load_config(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
