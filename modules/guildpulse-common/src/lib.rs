pub mod config;
pub mod error;
pub mod file_config;

pub use config::Config;
pub use error::ConfigError;
pub use file_config::{load_config, DatabaseConfig, DispatchConfig, FileConfig};
