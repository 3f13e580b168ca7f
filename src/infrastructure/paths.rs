//! Platform path resolution.
//!
//! This module locates the directories and default file names the crate uses,
//! following each platform's conventions through the `dirs` crate. It also
//! handles tilde expansion for paths read from configuration files.

use std::path::{Path, PathBuf};

/// Directory name used under the platform data and config directories.
pub const APP_DIR_NAME: &str = "watch-history";

/// Default name of the history store file.
pub const DEFAULT_STORE_FILE: &str = "history.json";

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default name of the log file.
pub const DEFAULT_LOG_FILE: &str = "watch-history.log";

/// Returns the data directory for history storage and logs.
///
/// Resolves to the platform's local data directory joined with
/// [`APP_DIR_NAME`], for example `~/.local/share/watch-history` on Linux.
/// Falls back to `./watch-history` when the platform reports no data directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Returns the default configuration file path, if the platform has a config
/// directory.
///
/// On Linux this is `~/.config/watch-history/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a leading tilde, and every path when the home directory is
/// unknown, are returned unchanged.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use watch_history::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde(Path::new("/absolute/path")), Path::new("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolves `path` against `base` unless it is already absolute.
///
/// Tildes are expanded first.
#[must_use]
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_base() {
        assert_eq!(
            resolve(Path::new("/data"), Path::new("history.json")),
            Path::new("/data/history.json")
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        assert_eq!(
            resolve(Path::new("/data"), Path::new("/tmp/other.json")),
            Path::new("/tmp/other.json")
        );
    }

    #[test]
    fn tilde_uses_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~")), home);
            assert_eq!(expand_tilde(Path::new("~/videos")), home.join("videos"));
        }
    }

    #[test]
    fn data_dir_ends_with_app_name() {
        assert!(data_dir().ends_with(APP_DIR_NAME));
    }
}
