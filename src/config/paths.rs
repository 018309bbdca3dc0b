//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout (config dir holds both the settings file and the history log):
//!
//!   Windows: %APPDATA%\voxkey\
//!   macOS:   ~/Library/Application Support/voxkey/
//!   Linux:   ~/.config/voxkey/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `config.toml` and `history.jsonl`.
    pub config_dir: PathBuf,
    /// Full path to `config.toml`.
    pub config_file: PathBuf,
    /// Full path to `history.jsonl`.
    pub history_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voxkey";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let config_file = config_dir.join("config.toml");
        let history_file = config_dir.join("history.jsonl");

        Self {
            config_dir,
            config_file,
            history_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .config_file
            .file_name()
            .is_some_and(|n| n == "config.toml"));
        assert!(paths
            .history_file
            .file_name()
            .is_some_and(|n| n == "history.jsonl"));
    }
}
