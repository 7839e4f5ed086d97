//! Configuration and persisted sandbox settings
//!
//! Documents are XML (quick-xml, with an XML declaration) unless the path ends
//! in `.json`. Vectors are written as `x`/`y`/`z` child elements so both
//! formats stay readable.

use std::fs;
use std::path::{Path, PathBuf};

use glam::{Vec3, Vec4};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calibration::ChessboardConfig;
use crate::filter::FilterConfig;
use crate::geometry::{BasePlane, ElevationRange, Roi};
use crate::sensor::DepthIntrinsics;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// Errors reading or writing settings documents
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::DeError),
    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::SeError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not find config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Xml,
    Json,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Xml,
        }
    }
}

/// Read a document, choosing the format from the file extension.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, SettingsError> {
    let contents = fs::read_to_string(path)?;
    let value = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::from_str(&contents)?,
        DocumentFormat::Xml => quick_xml::de::from_str(&contents)?,
    };
    Ok(value)
}

/// Write a document, choosing the format from the file extension.
/// Missing parent directories are created.
pub fn write_document<T: Serialize>(value: &T, path: &Path) -> Result<(), SettingsError> {
    let contents = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::to_string_pretty(value)?,
        DocumentFormat::Xml => {
            let xml = quick_xml::se::to_string(value)?;
            format!("{}\n{}", XML_DECLARATION, xml)
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}

/// 3-vector as child elements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3Doc {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Doc {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Doc> for Vec3 {
    fn from(v: Vec3Doc) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// 4-vector as child elements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec4Doc {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<Vec4> for Vec4Doc {
    fn from(v: Vec4) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            w: v.w,
        }
    }
}

impl From<Vec4Doc> for Vec4 {
    fn from(v: Vec4Doc) -> Self {
        Vec4::new(v.x, v.y, v.z, v.w)
    }
}

/// Base plane as stored in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasePlaneConfig {
    pub normal: Vec3Doc,
    pub offset: Vec3Doc,
}

impl Default for BasePlaneConfig {
    fn default() -> Self {
        BasePlane::default().into()
    }
}

impl From<BasePlane> for BasePlaneConfig {
    fn from(plane: BasePlane) -> Self {
        Self {
            normal: plane.normal.into(),
            offset: plane.offset.into(),
        }
    }
}

impl From<BasePlaneConfig> for BasePlane {
    fn from(config: BasePlaneConfig) -> Self {
        BasePlane::new(config.normal.into(), config.offset.into())
    }
}

/// Everything needed to start the sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SandboxConfig", default)]
pub struct SandboxConfig {
    pub filter: FilterConfig,
    pub chessboard: ChessboardConfig,
    pub base_plane: BasePlaneConfig,
    pub elevation: ElevationRange,
    pub intrinsics: DepthIntrinsics,
    /// Calibration document loaded at start-up and written on save
    pub calibration_file: String,
    /// ROI and base plane document
    pub settings_file: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            chessboard: ChessboardConfig::default(),
            base_plane: BasePlaneConfig::default(),
            elevation: ElevationRange::default(),
            intrinsics: DepthIntrinsics::default(),
            calibration_file: "calibration.xml".to_string(),
            settings_file: "sandbox_settings.xml".to_string(),
        }
    }
}

impl SandboxConfig {
    /// `<config dir>/ARSandbox/config.xml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("ARSandbox");
            p.push("config.xml");
            p
        })
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let mut config: Self = read_document(path)?;
        config.filter = config.filter.validated();
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        write_document(self, path)
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to_file(&path)
    }
}

/// Detected ROI and base plane, saved between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "SandboxSettings")]
pub struct SandboxSettings {
    pub roi: Roi,
    pub base_plane: BasePlaneConfig,
    /// Normalized plane equation at save time
    pub plane_equation: Vec4Doc,
}

impl SandboxSettings {
    pub fn new(roi: Roi, base_plane: BasePlane, depth_norm: f32) -> Self {
        Self {
            roi,
            base_plane: base_plane.into(),
            plane_equation: base_plane.equation(depth_norm).into(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let mut settings: Self = read_document(path)?;
        settings.roi = settings.roi.standardized();
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        write_document(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.xml")), DocumentFormat::Xml);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Xml);
    }

    #[test]
    fn test_config_xml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.xml");

        let mut config = SandboxConfig::default();
        config.filter.averaging_slots = 12;
        config.chessboard.size = 260;
        config.save_to_file(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(XML_DECLARATION));

        let loaded = SandboxConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SandboxConfig::default();
        config.base_plane.offset.z = 900.0;
        config.save_to_file(&path).unwrap();

        let loaded = SandboxConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.base_plane.offset.z, 900.0);
    }

    #[test]
    fn test_loaded_filter_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"filter": {"averaging_slots": 0}}"#).unwrap();

        let loaded = SandboxConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.filter.averaging_slots, 1);
        assert_eq!(loaded.calibration_file, "calibration.xml");
    }

    #[test]
    fn test_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.xml");

        let mut plane = BasePlane::default();
        plane.nudge_offset(2.0);
        let settings = SandboxSettings::new(Roi::new(10, 20, 300, 200), plane, 2000.0);
        settings.save_to_file(&path).unwrap();

        let loaded = SandboxSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded.roi, Roi::new(10, 20, 300, 200));
        assert_eq!(BasePlane::from(loaded.base_plane).offset.z, 871.0);
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_file() {
        let err = SandboxConfig::load_from_file(Path::new("/nonexistent/config.xml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }
}
