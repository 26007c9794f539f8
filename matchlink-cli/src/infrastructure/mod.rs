pub mod config_file;
pub mod error;
pub mod observability;

pub use config_file::load_session_config;
pub use error::{CliError, Result};
pub use observability::LogConfig;
