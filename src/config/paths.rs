//! Cross-platform application paths using the `dirs` crate.
//!
//! Config dir (`settings.toml`):
//!   Windows: %APPDATA%\hanzi-cards\
//!   macOS:   ~/Library/Application Support/hanzi-cards/
//!   Linux:   ~/.config/hanzi-cards/
//!
//! Cache dir (normalised audio), used when `home_dir` is not configured:
//!   Windows: %LOCALAPPDATA%\hanzi-cards\
//!   macOS:   ~/Library/Caches/hanzi-cards/
//!   Linux:   ~/.cache/hanzi-cards/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default audio cache root.
    pub cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "hanzi-cards";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            cache_dir,
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
        assert!(paths.cache_dir.ends_with("hanzi-cards"));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
    }
}
