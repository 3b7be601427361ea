//! Configuration file loader for the `.studio/` directory.
//!
//! Only `.studio/config.toml` is read. Every section is optional and falls
//! back to the defaults in [`StudioConfig`].

use crate::config::error::{ConfigError, ConfigResult};
use std::path::Path;
use studio_protocol::config_models::StudioConfig;
use tokio::sync::Semaphore;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".studio";

/// Loads configuration from `<root>/.studio/config.toml`.
///
/// # Arguments
///
/// * `root` - Directory containing the `.studio/` folder
///
/// # Returns
///
/// The parsed configuration, or the defaults if the directory or file does
/// not exist.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists but cannot be read
/// - The file is not valid TOML or has fields of the wrong type
/// - A value is out of range (zero attempts, zero concurrency, empty URL)
///
/// # Example
///
/// ```rust,no_run
/// use studio_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Inference backend at {}", config.inference.base_url);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<StudioConfig> {
    let config_path = root.join(CONFIG_DIR).join("config.toml");

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config file, using defaults");
        return Ok(StudioConfig::default());
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: StudioConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate(&config).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path,
        reason,
    })?;

    Ok(config)
}

fn validate(config: &StudioConfig) -> Result<(), String> {
    if config.retry.max_attempts == 0 {
        return Err("retry.max-attempts must be at least 1".to_string());
    }
    let multiplier = config.retry.backoff_multiplier;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err("retry.backoff-multiplier must be a finite number of at least 1.0".to_string());
    }
    match config.preview.max_in_flight {
        Some(0) => {
            return Err("preview.max-in-flight must be at least 1 when set".to_string());
        }
        Some(limit) if limit > Semaphore::MAX_PERMITS => {
            return Err(format!(
                "preview.max-in-flight must be at most {}",
                Semaphore::MAX_PERMITS
            ));
        }
        _ => {}
    }
    if config.inference.base_url.trim().is_empty() {
        return Err("inference.base-url must not be empty".to_string());
    }
    Ok(())
}
