//! Default values for configuration settings.

// =============================================================================
// Connection limits
// =============================================================================

/// Default maximum concurrent requests to a single host.
pub const DEFAULT_PER_HOST_PARALLEL_FETCHES: usize = 10;

/// Default maximum concurrent requests across all hosts.
///
/// Also the default worker count of the ordered fetch executor.
pub const DEFAULT_GLOBAL_PARALLEL_FETCHES: usize = 30;

/// Default time to wait for a connection lease and to establish a connection.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Default time to wait for response data.
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// Executor
// =============================================================================

/// Default grace period for workers to exit on stop.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Files
// =============================================================================

/// Name of the configuration directory under the user's home.
pub const CONFIG_DIR_NAME: &str = ".printmap";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";
