use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANALYSIS_MODEL, DEFAULT_API_BASE_URL, DEFAULT_TIMELINE_MS, DEFAULT_TTS_MODEL,
    DEFAULT_VOICE_NAME,
};

const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "MY_API_KEY"];

/// Viewport used when no camera frame is available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the generative language API
    pub api_base_url: String,
    /// Model used for frame diagnosis
    pub analysis_model: String,
    /// Model used for speech guidance
    pub tts_model: String,
    /// Prebuilt voice name for speech guidance
    pub voice_name: String,
    /// API key; the environment takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Speak the instruction after each diagnosis
    pub tts_enabled: bool,
    /// Length of one overlay cue in milliseconds
    pub timeline_ms: f64,
    /// Frames per second for offline rendering
    pub fps: f64,
    /// JPEG quality used when uploading a frame
    pub jpeg_quality: u8,
    /// TTF/OTF font used to rasterise labels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_font_path: Option<PathBuf>,
    pub demo_viewport: ViewportSize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            api_key: None,
            tts_enabled: true,
            timeline_ms: DEFAULT_TIMELINE_MS,
            fps: 30.0,
            jpeg_quality: 80,
            label_font_path: None,
            demo_viewport: ViewportSize::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> io::Result<Self> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => return Err(err),
        };
        let config: AppConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    /// Resolve the API key from the environment, then the config file.
    /// Placeholder values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .chain(self.api_key.clone())
            .find(|key| is_usable_api_key(key))
    }
}

pub fn is_usable_api_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != "undefined" && !key.contains("YOUR_GEMINI_API_KEY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"fps": 24, "tts_enabled": false}"#).unwrap();
        assert_eq!(config.fps, 24.0);
        assert!(!config.tts_enabled);
        assert_eq!(config.timeline_ms, DEFAULT_TIMELINE_MS);
        assert_eq!(config.analysis_model, DEFAULT_ANALYSIS_MODEL);
        assert_eq!(config.demo_viewport, ViewportSize::default());
    }

    #[test]
    fn test_placeholder_keys_are_rejected() {
        assert!(!is_usable_api_key(""));
        assert!(!is_usable_api_key("undefined"));
        assert!(!is_usable_api_key("PUT_YOUR_GEMINI_API_KEY_HERE"));
        assert!(is_usable_api_key("AIzaSy-real"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("fixit-ar-missing-{}.json", uuid::Uuid::new_v4()));
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("fixit-ar-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let config = AppConfig {
            voice_name: "Kore".to_string(),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.voice_name, "Kore");
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
