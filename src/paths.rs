//! Path resolution for fwsync
//!
//! # Environment Variables
//!
//! - `FWSYNC_CONFIG_DIR` - Override config directory
//! - `FWSYNC_STATE_DIR` - Override state directory
//!
//! For config_dir():
//! 1. `FWSYNC_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/fwsync` (if set)
//! 3. `~/.config/fwsync`
//!
//! For state_dir():
//! 1. `FWSYNC_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/fwsync` (if set)
//! 3. `~/.local/state/fwsync`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "FWSYNC_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "FWSYNC_STATE_DIR";

const APP_DIR: &str = "fwsync";

/// Get the fwsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join(APP_DIR))
}

/// Get the fwsync state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join(APP_DIR))
}

/// Default location of the config file.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Default location of the applied-state file.
pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("state.toml"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `key` set, restoring the previous value afterwards.
    ///
    /// Env mutation is process-wide; keep keys unique per test.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: each test touches its own variable
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: as above
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_config_dir_env_override() {
        with_env_var(ENV_CONFIG_DIR, "/custom/fwsync/config", || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/custom/fwsync/config"));
            assert_eq!(
                config_file().unwrap(),
                PathBuf::from("/custom/fwsync/config/config.toml")
            );
        });
    }

    #[test]
    fn test_state_dir_env_override_with_tilde() {
        let home = dirs::home_dir().unwrap();
        with_env_var(ENV_STATE_DIR, "~/fwsync-state-test", || {
            assert_eq!(state_dir().unwrap(), home.join("fwsync-state-test"));
            assert_eq!(
                state_file().unwrap(),
                home.join("fwsync-state-test").join("state.toml")
            );
        });
    }

    #[test]
    fn test_expand() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/a/b"), home.join("a").join("b"));
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
        with_env_var("FWSYNC_TEST_EXPAND", "v", || {
            assert_eq!(expand("/x/$FWSYNC_TEST_EXPAND/y"), PathBuf::from("/x/v/y"));
        });
        assert_eq!(
            expand("/x/$FWSYNC_UNSET_VAR_98765/y"),
            PathBuf::from("/x/$FWSYNC_UNSET_VAR_98765/y")
        );
    }
}
