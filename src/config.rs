use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variable naming a JSON file with an `EngineConfig`.
pub const CONFIG_ENV_VAR: &str = "DIRVIEW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path text that resolves to the Home location without any I/O.
    pub home_sentinel: String,
    pub search: SearchConfig,
    pub icons: IconConfig,
    /// Worker count for attribute/icon loading. `None` uses the number of CPUs.
    pub detail_workers: Option<usize>,
    /// Where the local view-settings store keeps its JSON file.
    pub view_settings_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconConfig {
    pub thumbnail_size: u32,
    /// Icons are loaded together with attributes only while the listing has
    /// fewer than `preload_factor * cpus` items.
    pub preload_factor: usize,
    /// Content-bearing types whose thumbnails never come from the cache.
    pub thumbnail_extensions: Vec<String>,
    /// Types whose icon depends on the file itself and is cached by full path.
    pub instance_extensions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            home_sentinel: "$Home".to_string(),
            search: SearchConfig::default(),
            icons: IconConfig::default(),
            detail_workers: None,
            view_settings_file: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 999 }
    }
}

impl Default for IconConfig {
    fn default() -> Self {
        let thumbnail_extensions = [
            "jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "ico", "svg", "mp3", "flac", "avi",
            "wmv", "mpeg", "mp4", "m4v", "mov", "asf", "flv", "f4v", "rmvb", "rm", "3gp", "vob",
            "docx", "pptx", "pdf",
        ];
        Self {
            thumbnail_size: 128,
            preload_factor: 20,
            thumbnail_extensions: thumbnail_extensions.iter().map(|e| e.to_string()).collect(),
            instance_extensions: ["exe", "ico", "lnk", "url"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load from `$DIRVIEW_CONFIG` when set, otherwise use defaults.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load_from_file(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        log::debug!("Loaded engine config from {:?}", path.as_ref());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Number of parallel detail-loading units.
    pub fn worker_count(&self) -> usize {
        self.detail_workers
            .filter(|n| *n > 0)
            .unwrap_or_else(available_cpus)
    }

    /// Whether a listing of `item_count` items should load icons eagerly.
    pub fn should_preload_icons(&self, item_count: usize) -> bool {
        item_count < self.icons.preload_factor * available_cpus()
    }
}

pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.home_sentinel, "$Home");
        assert_eq!(config.search.max_results, 999);
        assert_eq!(config.icons.thumbnail_size, 128);
        assert!(config.icons.thumbnail_extensions.contains(&"png".to_string()));
        assert!(config.icons.instance_extensions.contains(&"exe".to_string()));
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "search": { "max_results": 10 }, "detail_workers": 2 }"#).unwrap();

        let config = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.home_sentinel, "$Home");
        assert_eq!(config.icons, IconConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut config = EngineConfig::default();
        config.icons.preload_factor = 3;
        config.save_to_file(&path).unwrap();

        assert_eq!(EngineConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_workers_means_auto() {
        let config = EngineConfig {
            detail_workers: Some(0),
            ..EngineConfig::default()
        };
        assert_eq!(config.worker_count(), available_cpus());
    }
}
