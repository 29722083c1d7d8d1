use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::reflection::{DEFAULT_HALLUCINATION_THRESHOLD, DEFAULT_MAX_ITERATIONS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub reflection: ReflectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent queries admitted by the worker pool
    pub worker_count: usize,
    pub use_cache: bool,
    pub use_memory: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    pub enabled: bool,
    pub max_iterations: usize,
    pub hallucination_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: 4usize.min(num_cpus::get().max(1)),
            use_cache: true,
            use_memory: true,
        }
    }
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            hallucination_threshold: DEFAULT_HALLUCINATION_THRESHOLD,
        }
    }
}

impl RagConfig {
    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = RagConfig::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context("Failed to read config file")?;

        let config: RagConfig = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".verirag").join("config.toml"))
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            pipeline: PipelineConfig::default(),
            reflection: ReflectionConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RagConfig::default();
        assert!(config.pipeline.worker_count >= 1);
        assert!(config.pipeline.worker_count <= 4);
        assert!(config.reflection.enabled);
        assert_eq!(config.reflection.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_config_serialization() {
        let config = RagConfig::default();

        let toml_string = toml::to_string(&config).unwrap();
        assert!(toml_string.contains("max_iterations"));

        let deserialized: RagConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(deserialized.pipeline.worker_count, config.pipeline.worker_count);
        assert_eq!(deserialized.cache.ttl_seconds, config.cache.ttl_seconds);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: RagConfig = toml::from_str(
            "[reflection]\nenabled = false\nmax_iterations = 5\nhallucination_threshold = 0.4\n",
        )
        .unwrap();
        assert!(!config.reflection.enabled);
        assert_eq!(config.reflection.max_iterations, 5);
        assert!(config.pipeline.use_cache);
        assert_eq!(config.cache.ttl_seconds, crate::cache::DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = RagConfig::default();
        config.pipeline.worker_count = 9;
        config.save_to(&path).unwrap();

        let loaded = RagConfig::load_from(&path).unwrap();
        assert_eq!(loaded.pipeline.worker_count, 9);
    }
}
