//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → .env / environment overrides (RPC_URL, CHAIN_ID, PRIVATE_KEY)
//!     → FacadeConfig (validated, immutable)
//!     → passed explicitly into ChainFacade::connect
//! ```
//!
//! The facade never reads the environment itself; only the loader does.

pub mod loader;
pub mod schema;
pub mod secret;
pub mod validation;

pub use loader::{load_config, load_with_env, override_endpoint, ConfigError};
pub use schema::{
    ChainConfig, ContractConfig, FacadeConfig, ObservabilityConfig, ReceiptConfig, SignerConfig,
    WatchConfig,
};
pub use secret::SecretString;
