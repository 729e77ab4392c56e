//! Platform-specific application paths.
//!
//! - Linux/macOS: `~/.config/brickval/`
//! - Windows: `%APPDATA%/brickval/`

use std::path::PathBuf;

use directories::ProjectDirs;

/// Resolved application directories.
#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// Resolve platform directories, falling back to the current directory
    /// when the home directory cannot be determined.
    #[must_use]
    pub fn resolve() -> Self {
        let config_dir = ProjectDirs::from("", "", "brickval")
            .map_or_else(|| PathBuf::from("."), |dirs| dirs.config_dir().to_path_buf());
        Self { config_dir }
    }

    /// Directory holding the config file.
    #[must_use]
    pub fn config_dir(&self) -> &std::path::Path {
        &self.config_dir
    }

    /// Full path of the config file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_under_config_dir() {
        let paths = AppPaths::resolve();
        assert!(paths.config_file().starts_with(paths.config_dir()));
        assert_eq!(paths.config_file().file_name().unwrap(), "config.toml");
    }
}
