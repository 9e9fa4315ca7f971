//! Stow Services Layer
//!
//! Process-level services around the core: settings loading and logging
//! setup parameters.

pub mod settings;

pub use settings::{LoggingSettings, Settings, SettingsError};

use std::path::Path;
use tracing::info;

/// Read settings from `path`, or fall back to defaults when no path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    match path {
        Some(path) => Settings::load(path),
        None => Ok(Settings::default()),
    }
}

/// Report the effective settings once logging is up.
pub fn init_services(settings: &Settings) {
    info!(
        level = %settings.logging.level,
        drop_offset = ?settings.core.drop_offset,
        verify_container_flags = settings.core.verify_container_flags,
        "services initialized"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_means_defaults() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
    }
}
