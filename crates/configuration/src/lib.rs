use crate::error::ConfigError;

// Declare the modules that make up this crate.
pub mod error;
pub mod key_store;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use key_store::{ApiKeys, KeyStore};
pub use logging::init_tracing;
pub use settings::{
    AiSearchSettings, DashboardSettings, LoggingSettings, Settings, StructuredApiSettings,
    UnderlyingSettings,
};

/// The environment prefix for overriding any setting, e.g.
/// `YIELDSCOPE__UNDERLYING__TICKER=QQQ`.
pub const ENV_PREFIX: &str = "YIELDSCOPE";

/// Loads settings from the given file overlaid with environment variables, then
/// validates them.
///
/// The file is optional; every section falls back to its defaults.
pub fn load_settings_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_settings(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.toml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_file_and_validates() {
        let path = write_settings(
            "yieldscope-settings",
            "[dashboard]\nspread_width = 10\n\n[structured_api]\ntop_n = 8\n",
        );
        let settings = load_settings_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.dashboard.spread_width, rust_decimal::Decimal::from(10));
        assert_eq!(settings.structured_api.top_n, 8);
        assert_eq!(settings.underlying.ticker, "SPY");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("yieldscope-absent-settings.toml");
        let settings = load_settings_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.structured_api.snapshot_limit, 250);
    }

    #[test]
    fn invalid_file_values_are_rejected() {
        let path = write_settings("yieldscope-invalid", "[dashboard]\nspread_width = 0\n");
        let result = load_settings_from(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
