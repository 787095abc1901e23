use crate::core::batch_loader::DEFAULT_CHUNK_SIZE;
use crate::core::frequency::FrequencyStrategy;
use crate::function::Shape;
use crate::settings::DEFAULT_INTEGRATION_INTERVALS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_chunk_size")]
    pub chunk_size: usize,
    /// 0 = available parallelism.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "EngineConfig::default_initial_rotor_count")]
    pub initial_rotor_count: usize,
    /// Soft cap on cached rotor states; 0 = unbounded.
    #[serde(default)]
    pub max_cached_states: usize,
}

impl EngineConfig {
    fn default_chunk_size() -> usize {
        DEFAULT_CHUNK_SIZE
    }
    fn default_initial_rotor_count() -> usize {
        100
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            worker_threads: 0,
            initial_rotor_count: Self::default_initial_rotor_count(),
            max_cached_states: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrationConfig {
    #[serde(default = "IntegrationConfig::default_intervals")]
    pub intervals: usize,
}

impl IntegrationConfig {
    fn default_intervals() -> usize {
        DEFAULT_INTEGRATION_INTERVALS
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            intervals: Self::default_intervals(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionConfig {
    #[serde(default = "FunctionConfig::default_shape")]
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<FrequencyStrategy>,
}

impl FunctionConfig {
    fn default_shape() -> Shape {
        Shape::Circle
    }
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            shape: Self::default_shape(),
            strategy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub function: FunctionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Comments out every key so the written file documents the defaults
    /// without pinning them.
    fn commented(text: &str) -> String {
        let mut commented = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                commented.push('\n');
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
                commented.push_str(line);
                commented.push('\n');
            } else {
                commented.push_str("# ");
                commented.push_str(line);
                commented.push('\n');
            }
        }
        commented
    }

    pub fn load_or_default(path: &str) -> Self {
        let path_obj = Path::new(path);
        if path_obj.exists() {
            match fs::read_to_string(path_obj) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        eprintln!("Failed to parse config {path}: {err}. Using defaults.");
                    }
                },
                Err(err) => {
                    eprintln!("Failed to read config {path}: {err}. Using defaults.");
                }
            }
            return Self::default();
        }

        // File does not exist: write defaults and return them.
        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path_obj, Self::commented(&text)) {
                    eprintln!("Failed to write default config to {path}: {err}");
                }
            }
            Err(err) => {
                eprintln!("Failed to serialize default config ({err}); continuing with defaults");
            }
        }
        default_cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn unique_path(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "epicycles_config_test_{}_{}",
            name,
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        p
    }

    #[test]
    fn load_or_default_writes_defaults_cleanly() {
        let path = unique_path("defaults.toml");
        let path_str = path.to_string_lossy().to_string();
        let _ = fs::remove_file(&path);

        let cfg = AppConfig::load_or_default(&path_str);
        assert!(path.exists(), "config file should be created");
        assert_eq!(cfg.engine.chunk_size, 80);
        assert_eq!(cfg.engine.initial_rotor_count, 100);
        assert_eq!(cfg.integration.intervals, DEFAULT_INTEGRATION_INTERVALS);
        assert_eq!(cfg.logging.filter, "info");

        let contents = fs::read_to_string(&path).expect("read written config");
        assert!(contents.contains("[engine]"));
        assert!(
            contents.contains("# chunk_size = 80"),
            "should write commented chunk_size"
        );
        assert!(
            contents.contains("# shape = \"circle\""),
            "should write commented shape"
        );
        // A commented file parses back to defaults.
        let reparsed: AppConfig = toml::from_str(&contents).expect("parse commented defaults");
        assert_eq!(reparsed, AppConfig::default());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_or_default_reads_existing() {
        let path = unique_path("custom.toml");
        let path_str = path.to_string_lossy().to_string();
        let custom = AppConfig {
            engine: EngineConfig {
                chunk_size: 16,
                worker_threads: 3,
                initial_rotor_count: 12,
                max_cached_states: 4096,
            },
            integration: IntegrationConfig { intervals: 512 },
            function: FunctionConfig {
                shape: Shape::Star,
                strategy: Some(FrequencyStrategy::Centered { multiplier: 1.0 }),
            },
            logging: LoggingConfig {
                filter: "epicycles=debug".to_string(),
            },
        };
        let text = toml::to_string_pretty(&custom).unwrap();
        fs::write(&path, text).unwrap();

        let cfg = AppConfig::load_or_default(&path_str);
        assert_eq!(cfg, custom);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let text = r#"
[engine]
chunk_size = 32

[function]
shape = "square"
strategy = { kind = "index-proportional", multiplier = 2.0 }
"#;
        let cfg: AppConfig = toml::from_str(text).expect("parse partial config");
        assert_eq!(cfg.engine.chunk_size, 32);
        assert_eq!(cfg.engine.initial_rotor_count, 100);
        assert_eq!(cfg.function.shape, Shape::Square);
        assert_eq!(
            cfg.function.strategy,
            Some(FrequencyStrategy::IndexProportional { multiplier: 2.0 })
        );
        assert_eq!(cfg.integration, IntegrationConfig::default());
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let path = unique_path("garbage.toml");
        fs::write(&path, "engine = [[[").unwrap();
        let cfg = AppConfig::load_or_default(&path.to_string_lossy());
        assert_eq!(cfg, AppConfig::default());
        let _ = fs::remove_file(&path);
    }
}
