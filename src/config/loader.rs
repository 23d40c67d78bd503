//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::FacadeConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::SecretString;

/// Environment variable naming a TOML config file.
pub const CONFIG_PATH_ENV_VAR: &str = "CHAIN_FACADE_CONFIG";
/// Environment variable overriding `chain.endpoint_url`.
pub const RPC_URL_ENV_VAR: &str = "RPC_URL";
/// Environment variable overriding `chain.chain_id`.
pub const CHAIN_ID_ENV_VAR: &str = "CHAIN_ID";
/// Environment variable supplying `signer.private_key`.
pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env(e) => write!(f, "Environment error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<FacadeConfig, ConfigError> {
    let config: FacadeConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<FacadeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Apply overrides from a key lookup (normally the process environment).
pub fn apply_overrides<F>(config: &mut FacadeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV_VAR) {
        config.chain.endpoint_url = url;
    }
    if let Some(id) = lookup(CHAIN_ID_ENV_VAR) {
        config.chain.chain_id = id
            .trim()
            .parse()
            .map_err(|e| ConfigError::Env(format!("{} is not a number: {}", CHAIN_ID_ENV_VAR, e)))?;
    }
    if let Some(key) = lookup(PRIVATE_KEY_ENV_VAR) {
        config.signer.private_key = Some(SecretString::new(key));
    }
    validate_config(config).map_err(ConfigError::Validation)
}

/// Replace the RPC endpoint of an already loaded configuration, validating
/// the result again.
pub fn override_endpoint(config: &mut FacadeConfig, url: String) -> Result<(), ConfigError> {
    config.chain.endpoint_url = url;
    validate_config(config).map_err(ConfigError::Validation)
}

/// Build the configuration used by the binaries.
///
/// Reads `.env` if present, loads the file named by `CHAIN_FACADE_CONFIG` (or
/// `path` when given, or defaults), then applies `RPC_URL`, `CHAIN_ID` and
/// `PRIVATE_KEY` from the environment.
pub fn load_with_env(path: Option<&Path>) -> Result<FacadeConfig, ConfigError> {
    if let Ok(dotenv_path) = dotenvy::dotenv() {
        tracing::debug!(path = %dotenv_path.display(), "Loaded .env file");
    }

    let env_path = std::env::var(CONFIG_PATH_ENV_VAR).ok();
    let mut config = match path.or(env_path.as_deref().map(Path::new)) {
        Some(path) => load_config(path)?,
        None => FacadeConfig::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}
