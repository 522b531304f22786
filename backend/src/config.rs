use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/imagelab.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Process-wide settings, loaded once in `main` and handed to every
/// component that needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub image_folder: PathBuf,
    #[serde(default = "default_extension")]
    pub accepted_extension: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    #[serde(flatten)]
    pub kind: ModelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Palette {
        classes: Vec<PaletteClass>,
        #[serde(default = "default_temperature")]
        temperature: f32,
    },
    Torchscript {
        path: PathBuf,
        labels: PathBuf,
        #[serde(default = "default_input_size")]
        input_size: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaletteClass {
    pub label: String,
    pub rgb: [u8; 3],
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_extension() -> String {
    "jpeg".to_string()
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

fn default_temperature() -> f32 {
    32.0
}

fn default_input_size() -> u32 {
    224
}

impl AppConfig {
    /// Reads the YAML file named by `IMAGELAB_CONFIG` (or the default path)
    /// and applies environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("IMAGELAB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port })?;
        }
        if let Ok(folder) = env::var("IMAGE_FOLDER") {
            self.storage.image_folder = PathBuf::from(folder);
        }
        if let Ok(dir) = env::var("STATIC_DIR") {
            self.static_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  host: 127.0.0.1
  port: 9000
storage:
  image_folder: data/images
models:
  - id: palette-basic
    kind: palette
    classes:
      - label: red
        rgb: [220, 40, 40]
      - label: blue
        rgb: [40, 40, 220]
  - id: resnet18
    kind: torchscript
    path: models/resnet18.pt
    labels: models/imagenet_classes.txt
"#;

    #[test]
    fn parses_models_in_declaration_order() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        let ids: Vec<_> = config.models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["palette-basic", "resnet18"]);

        match &config.models[0].kind {
            ModelKind::Palette { classes, temperature } => {
                assert_eq!(classes.len(), 2);
                assert_eq!(classes[1].rgb, [40, 40, 220]);
                assert_eq!(*temperature, 32.0);
            }
            other => panic!("unexpected model kind: {other:?}"),
        }
        match &config.models[1].kind {
            ModelKind::Torchscript { input_size, .. } => assert_eq!(*input_size, 224),
            other => panic!("unexpected model kind: {other:?}"),
        }
    }

    #[test]
    fn fills_storage_and_static_defaults() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.storage.accepted_extension, "jpeg");
        assert_eq!(config.storage.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
    }

    #[test]
    fn rejects_unknown_model_kind() {
        let yaml = r#"
storage:
  image_folder: data
models:
  - id: x
    kind: onnx
"#;
        assert!(matches!(AppConfig::from_yaml(yaml), Err(ConfigError::Parse(_))));
    }
}
