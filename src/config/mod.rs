//! Application Configuration
//!
//! Service settings stored in TOML format. Every section falls back to its
//! defaults, so a config file only needs the keys it wants to override.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::OcrGranularity;

/// Rotations tried by the second search phase, in dispatch order.
/// 0 is covered by the first phase and is not listed.
pub const DEFAULT_CANDIDATE_ANGLES: [i32; 19] = [
    350, 355, 5, 10, //
    80, 85, 90, 95, 100, //
    170, 175, 180, 185, 190, //
    260, 265, 270, 275, 280,
];

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Rotation search settings
    pub search: SearchConfig,
    /// Image preprocessing settings
    pub preprocess: PreprocessConfig,
    /// OCR engine settings
    pub ocr: OcrSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to listen on
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rotation search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Weighted confidence at which a result is accepted and the search stops
    pub acceptance_threshold: f64,
    /// Angles (degrees, clockwise) tried when the unrotated attempt is unconvincing
    pub candidate_angles: Vec<i32>,
    /// Number of concurrent rotation workers
    pub worker_count: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.66,
            candidate_angles: DEFAULT_CANDIDATE_ANGLES.to_vec(),
            worker_count: 4,
        }
    }
}

impl SearchConfig {
    /// Normalize user supplied values into a usable search space.
    ///
    /// Angles are folded into `[0, 360)`, 0 and repeated angles are dropped
    /// (first occurrence keeps its position), the threshold is clamped to
    /// `[0, 1]` and at least one worker is kept.
    pub fn validated(&self) -> Self {
        let mut angles: Vec<i32> = Vec::with_capacity(self.candidate_angles.len());
        for angle in self.candidate_angles.iter().map(|a| a.rem_euclid(360)) {
            if angle != 0 && !angles.contains(&angle) {
                angles.push(angle);
            }
        }

        let threshold = if self.acceptance_threshold.is_nan() {
            Self::default().acceptance_threshold
        } else {
            self.acceptance_threshold.clamp(0.0, 1.0)
        };

        Self {
            acceptance_threshold: threshold,
            candidate_angles: angles,
            worker_count: self.worker_count.max(1),
        }
    }
}

/// Image preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Images with either side at or below this many pixels are not processed
    pub min_dimension: u32,
    /// Median filter radius (1 = 3x3 neighbourhood)
    pub median_radius: u32,
    /// Apply Otsu binarization after denoising
    pub binarize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_dimension: 32,
            median_radius: 1,
            binarize: false,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract language hint (several languages joined with `+`)
    pub language: String,
    /// Level at which regions are reported
    pub granularity: OcrGranularity,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng+rus".to_string(),
            granularity: OcrGranularity::Paragraph,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file, creating parent directories as needed
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}

/// Write the default configuration to `path`.
///
/// An existing file is left alone unless `overwrite` is set. Returns whether
/// the file was written.
pub fn write_default_config(path: &Path, overwrite: bool) -> Result<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    save_config(&AppConfig::default(), path)?;
    Ok(true)
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "ocrclassifier", "OcrClassifier")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Apply environment overrides on top of a loaded configuration
pub fn apply_env_overrides(config: &mut AppConfig) {
    apply_port_override(config, std::env::var("PORT").ok().as_deref());
}

fn apply_port_override(config: &mut AppConfig, port: Option<&str>) {
    let Some(raw) = port else {
        return;
    };
    match raw.trim().parse::<u16>() {
        Ok(port) => config.server.port = port,
        Err(_) => tracing::warn!("Ignoring invalid PORT value {:?}", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);

        assert!((config.search.acceptance_threshold - 0.66).abs() < 1e-9);
        assert_eq!(config.search.candidate_angles.len(), 19);
        assert_eq!(config.search.worker_count, 4);

        assert_eq!(config.preprocess.min_dimension, 32);
        assert_eq!(config.preprocess.median_radius, 1);
        assert!(!config.preprocess.binarize);

        assert_eq!(config.ocr.language, "eng+rus");
        assert_eq!(config.ocr.granularity, OcrGranularity::Paragraph);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.search.worker_count = 2;
        config.preprocess.binarize = true;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.search.worker_count, 2);
        assert!(parsed.preprocess.binarize);
        assert_eq!(parsed.search.candidate_angles, config.search.candidate_angles);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [search]
            worker_count = 8

            [ocr]
            granularity = "word"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.search.worker_count, 8);
        assert_eq!(parsed.search.candidate_angles.len(), 19);
        assert_eq!(parsed.ocr.granularity, OcrGranularity::Word);
        assert_eq!(parsed.ocr.language, "eng+rus");
        assert_eq!(parsed.server.port, 8080);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();
        let temp_file = NamedTempFile::new().unwrap();

        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(config.server.port, loaded.server.port);
        assert_eq!(config.search.candidate_angles, loaded.search.candidate_angles);
    }

    #[test]
    fn test_write_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default_config(&path, false).unwrap());
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.ocr.granularity, OcrGranularity::Paragraph);

        // Existing files survive unless overwriting is requested
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        assert!(!write_default_config(&path, false).unwrap());
        assert_eq!(load_config(&path).unwrap().server.port, 9000);

        assert!(write_default_config(&path, true).unwrap());
        assert_eq!(load_config(&path).unwrap().server.port, 8080);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_validated_search_config() {
        let config = SearchConfig {
            acceptance_threshold: 1.7,
            candidate_angles: vec![-10, 350, 0, 360, 90, 450, 5],
            worker_count: 0,
        };

        let validated = config.validated();
        assert_eq!(validated.candidate_angles, vec![350, 90, 5]);
        assert!((validated.acceptance_threshold - 1.0).abs() < 1e-9);
        assert_eq!(validated.worker_count, 1);
    }

    #[test]
    fn test_port_override() {
        let mut config = AppConfig::default();
        apply_port_override(&mut config, Some("9090"));
        assert_eq!(config.server.port, 9090);

        apply_port_override(&mut config, Some("not-a-port"));
        assert_eq!(config.server.port, 9090);

        apply_port_override(&mut config, None);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_addr(), "0.0.0.0:9090");
    }
}
