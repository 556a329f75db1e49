use std::path::{Path, PathBuf};

use crate::camera::error::{CameraError, Result};
use crate::settings::types::ViewerSettings;

/// Environment variable naming an alternative settings file.
pub const CONFIG_ENV: &str = "CAMERA_VIEWER_CONFIG";

/// Settings file looked up in the working directory by default.
pub const DEFAULT_CONFIG_FILE: &str = "camera-viewer.json";

/// Path of the settings file: `$CAMERA_VIEWER_CONFIG` if set, otherwise
/// `camera-viewer.json`.
pub fn settings_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load settings from a JSON file, returning defaults on a missing file.
pub fn load(path: &Path) -> Result<ViewerSettings> {
    if !path.exists() {
        tracing::debug!("No settings at {}, using defaults", path.display());
        return Ok(ViewerSettings::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CameraError::Settings(format!("{}: {e}", path.display())))?;
    let settings: ViewerSettings = serde_json::from_str(&contents)
        .map_err(|e| CameraError::Settings(format!("{}: {e}", path.display())))?;
    tracing::info!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings from the default location.
pub fn load_default() -> Result<ViewerSettings> {
    load(&settings_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::SourceKind;
    use tempfile::TempDir;

    #[test]
    fn load_returns_default_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nonexistent.json");
        let settings = load(&path).unwrap();
        assert_eq!(settings, ViewerSettings::default());
    }

    #[test]
    fn load_reads_values_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("camera-viewer.json");
        std::fs::write(
            &path,
            r#"{ "source": "dummy", "deviceIndex": 1, "overlay": true, "jpegQuality": 60 }"#,
        )
        .unwrap();

        let settings = load(&path).unwrap();
        assert_eq!(settings.source, SourceKind::Dummy);
        assert_eq!(settings.device_index, 1);
        assert!(settings.overlay);
        assert_eq!(settings.jpeg_quality, 60);
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(CameraError::Settings(_))));
    }

    #[test]
    fn load_rejects_unknown_source_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad-source.json");
        std::fs::write(&path, r#"{ "source": "firewire" }"#).unwrap();
        assert!(load(&path).is_err());
    }
}
