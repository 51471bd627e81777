//! Configuration for printmap components.
//!
//! - [`ConnectionSettings`]: outbound connection limits and timeouts
//! - [`ProxySettings`]: the outbound proxy and the hosts that bypass it
//! - [`ConfigFile`]: the INI file tying connection settings, print scales and
//!   security strategies together
//!
//! # Example
//!
//! ```
//! use printmap::config::ConnectionSettings;
//!
//! let settings = ConnectionSettings::new()
//!     .with_per_host_parallel_fetches(4)
//!     .with_connection_timeout_ms(5000);
//! assert_eq!(settings.global_parallel_fetches(), 30);
//! ```

mod connections;
mod defaults;
mod file;
mod parser;
mod proxy;

pub use connections::ConnectionSettings;
pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use proxy::{ProxyError, ProxySettings};
