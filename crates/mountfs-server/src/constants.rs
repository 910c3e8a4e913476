//! Server configuration constants.

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "MOUNTFS_CONFIG";

/// Directory under the user config dir holding mountfs files.
pub const CONFIG_DIR_NAME: &str = "mountfs";

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "mounts.ron";
