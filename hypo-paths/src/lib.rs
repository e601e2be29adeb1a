//! Filesystem locations used by the hypo CLI.
//!
//! Paths follow the XDG Base Directory layout on every platform so that
//! a config written on macOS reads the same as one written on Linux.

use std::path::PathBuf;

const APP_DIR: &str = "hypo";

/// Resolve `$<var>/hypo`, falling back to `~/<home_fallback>/hypo`.
///
/// An empty variable counts as unset.
fn xdg_dir(var: &str, home_fallback: &str) -> PathBuf {
    let base = match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .map(|home| home.join(home_fallback))
            .unwrap_or_else(|| PathBuf::from(home_fallback)),
    };
    base.join(APP_DIR)
}

/// Directory holding the user-level `config.toml`.
///
/// `$XDG_CONFIG_HOME/hypo`, or `~/.config/hypo`.
///
/// ```
/// let user_config = hypo_paths::config_dir().join("config.toml");
/// assert!(user_config.ends_with("hypo/config.toml"));
/// ```
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// Directory holding durable client state.
///
/// `$XDG_DATA_HOME/hypo`, or `~/.local/share/hypo`.
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// The CLI's persisted identity and cached assignments.
pub fn store_file() -> PathBuf {
    data_dir().join("store.json")
}
