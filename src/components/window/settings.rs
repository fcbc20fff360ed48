use crate::error::WidgetResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

pub const SETTINGS_FILE: &str = "window-settings.json";

pub const DEFAULT_WIDTH: u32 = 380;
pub const DEFAULT_HEIGHT: u32 = 600;
pub const DEFAULT_OPACITY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeName {
    Small,
    Medium,
    Large,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizePreset {
    pub width: u32,
    pub height: u32,
    pub label: &'static str,
}

impl SizeName {
    pub const PRESETS: [SizeName; 3] = [SizeName::Small, SizeName::Medium, SizeName::Large];

    /// Fixed dimensions; `Custom` has none
    pub fn preset(self) -> Option<SizePreset> {
        match self {
            SizeName::Small => Some(SizePreset { width: 320, height: 450, label: "Small" }),
            SizeName::Medium => Some(SizePreset { width: 380, height: 600, label: "Medium" }),
            SizeName::Large => Some(SizePreset { width: 450, height: 750, label: "Large" }),
            SizeName::Custom => None,
        }
    }
}

pub fn size_presets() -> BTreeMap<SizeName, SizePreset> {
    SizeName::PRESETS
        .iter()
        .filter_map(|name| name.preset().map(|preset| (*name, preset)))
        .collect()
}

/// Persisted window state. Every field is optional so a partial file
/// layers over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_on_top: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_hide: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_taskbar: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_widget: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeName>,
}

impl WindowSettings {
    pub fn defaults() -> Self {
        Self {
            x: None,
            y: None,
            width: Some(DEFAULT_WIDTH),
            height: Some(DEFAULT_HEIGHT),
            always_on_top: Some(false),
            auto_hide: Some(false),
            show_in_taskbar: Some(false),
            opacity: Some(DEFAULT_OPACITY),
            desktop_widget: Some(true),
            size: Some(SizeName::Medium),
        }
    }

    /// Fields set here win, the rest come from `base`
    pub fn merged_over(self, base: WindowSettings) -> Self {
        Self {
            x: self.x.or(base.x),
            y: self.y.or(base.y),
            width: self.width.or(base.width),
            height: self.height.or(base.height),
            always_on_top: self.always_on_top.or(base.always_on_top),
            auto_hide: self.auto_hide.or(base.auto_hide),
            show_in_taskbar: self.show_in_taskbar.or(base.show_in_taskbar),
            opacity: self.opacity.or(base.opacity),
            desktop_widget: self.desktop_widget.or(base.desktop_widget),
            size: self.size.or(base.size),
        }
    }

    pub fn width(&self) -> u32 {
        self.width.unwrap_or(DEFAULT_WIDTH)
    }

    pub fn height(&self) -> u32 {
        self.height.unwrap_or(DEFAULT_HEIGHT)
    }

    pub fn opacity(&self) -> f64 {
        self.opacity.unwrap_or(DEFAULT_OPACITY)
    }

    pub fn always_on_top(&self) -> bool {
        self.always_on_top.unwrap_or(false)
    }

    pub fn auto_hide(&self) -> bool {
        self.auto_hide.unwrap_or(false)
    }

    pub fn show_in_taskbar(&self) -> bool {
        self.show_in_taskbar.unwrap_or(false)
    }

    pub fn desktop_widget(&self) -> bool {
        self.desktop_widget.unwrap_or(true)
    }
}

/// `window-settings.json` in the data directory
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SETTINGS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents over the defaults; unreadable files yield the defaults
    pub fn load(&self) -> WindowSettings {
        if !self.path.exists() {
            return WindowSettings::defaults();
        }

        let parsed = fs::read_to_string(&self.path)
            .map_err(crate::error::Error::from)
            .and_then(|data| Ok(serde_json::from_str::<WindowSettings>(&data)?));

        match parsed {
            Ok(settings) => settings.merged_over(WindowSettings::defaults()),
            Err(e) => {
                error!("Failed to load window settings: {}", e);
                WindowSettings::defaults()
            }
        }
    }

    pub fn save(&self, settings: &WindowSettings) -> WidgetResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }

    /// Read-modify-write of the stored settings, logging failures
    pub fn update(&self, change: impl FnOnce(&mut WindowSettings)) {
        let mut settings = self.load();
        change(&mut settings);
        if let Err(e) = self.save(&settings) {
            warn!("Failed to save window settings: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_file_is_merged_over_defaults() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path());
        fs::write(file.path(), r#"{"x": 10, "opacity": 0.7, "size": "large"}"#).unwrap();

        let settings = file.load();
        assert_eq!(settings.x, Some(10));
        assert_eq!(settings.y, None);
        assert_eq!(settings.opacity(), 0.7);
        assert_eq!(settings.size, Some(SizeName::Large));
        assert_eq!(settings.width(), DEFAULT_WIDTH);
        assert!(settings.desktop_widget());
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path());
        fs::write(file.path(), "{not json").unwrap();
        assert_eq!(file.load(), WindowSettings::defaults());
    }

    #[test]
    fn saved_file_uses_camel_case_keys() {
        let dir = TempDir::new().unwrap();
        let file = SettingsFile::new(dir.path());
        file.update(|s| s.always_on_top = Some(true));

        let raw = fs::read_to_string(file.path()).unwrap();
        assert!(raw.contains("\"alwaysOnTop\": true"));
        assert!(raw.contains("\"desktopWidget\": true"));
        assert!(!raw.contains("\"x\""));
    }

    #[test]
    fn presets_match_their_names() {
        let presets = size_presets();
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[&SizeName::Small].width, 320);
        assert_eq!(presets[&SizeName::Large].height, 750);
        assert!(SizeName::Custom.preset().is_none());
    }
}
