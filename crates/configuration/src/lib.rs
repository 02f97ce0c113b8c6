use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    CashFlowSettings, CloseSettings, Config, FadeThresholds, LoggingSettings, OutputFormat,
    OutputSettings,
};

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "jobcost.toml";

/// Loads the application configuration.
///
/// Reads `path` (or `jobcost.toml` when `None`, in which case the file is optional), layers
/// `JOBCOST__SECTION__KEY` environment variables on top, deserializes into our strongly-typed
/// `Config` struct and validates it.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix("JOBCOST").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

/// Parses configuration from an in-memory TOML document. Environment variables are not consulted.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}
