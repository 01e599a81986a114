use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    pub labels: LabelsConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub trait Validatable {
    fn get_path(&self) -> PathBuf;

    fn validate(&self) -> Result<(), String> {
        let path = self.get_path();
        if !path.exists() {
            return Err(format!("File not found: {:?}", path));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,
    /// Fetched once into `model_dir` when the weights file is missing.
    #[serde(default)]
    pub download_url: Option<String>,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(5)
}

fn default_inference_timeout_ms() -> u64 {
    30_000
}

impl Validatable for ModelConfig {
    fn get_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    fn validate(&self) -> Result<(), String> {
        if self.num_instances == 0 {
            return Err("model.num_instances must be at least 1".to_string());
        }
        if self.download_url.is_none() && !self.get_path().exists() {
            return Err(format!(
                "Model file not found and no download_url set: {:?}",
                self.get_path()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LabelsConfig {
    pub labels_file: String,
    pub labels_dir: PathBuf,
}

impl Validatable for LabelsConfig {
    fn get_path(&self) -> PathBuf {
        self.labels_dir.join(&self.labels_file)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("current directory: {}", e)))?;
    get_configuration_from(&base_path.join("configuration"))
}

/// `base.yaml`, then `{APP_ENVIRONMENT}.yaml`, then `APP_*` variables with
/// `__` between nested keys, e.g. `APP_SERVER__PORT`.
pub fn get_configuration_from(
    configuration_directory: &Path,
) -> Result<Config, config::ConfigError> {
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<Config>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert!(matches!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        ));
        assert!(matches!(
            Environment::try_from("local".to_string()),
            Ok(Environment::Local)
        ));
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::try_from("DEBUG".to_string()).unwrap().as_str(), "debug");
        assert!(LogLevel::try_from("trace".to_string()).is_err());
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
log_level: info
server:
  host: 0.0.0.0
  port: 5001
model:
  onnx_file: yolov8n.onnx
  model_dir: ./models
  num_instances: 2
labels:
  labels_file: coco.txt
  labels_dir: ./labels
"#;
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.get_address(), "0.0.0.0:5001");
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.model.num_instances, 2);
        assert_eq!(config.model.inference_timeout_ms, 30_000);
        assert!(config.model.download_url.is_none());
        assert_eq!(config.model.get_path(), PathBuf::from("./models/yolov8n.onnx"));
        assert_eq!(config.labels.get_path(), PathBuf::from("./labels/coco.txt"));
    }

    #[test]
    fn test_model_validation() {
        let mut model = ModelConfig {
            onnx_file: "missing.onnx".to_string(),
            model_dir: PathBuf::from("/nonexistent"),
            num_instances: 1,
            inference_timeout_ms: 1000,
            download_url: None,
        };
        assert!(model.validate().is_err());

        model.download_url = Some("https://example.com/yolov8n.onnx".to_string());
        assert!(model.validate().is_ok());

        model.num_instances = 0;
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_env_overrides_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.yaml"),
            r#"
log_level: info
server:
  host: 127.0.0.1
  port: 5001
model:
  onnx_file: yolov8n.onnx
  model_dir: ./models
labels:
  labels_file: coco.txt
  labels_dir: ./labels
"#,
        )
        .unwrap();

        std::env::set_var("APP_SERVER__PORT", "8080");
        let config = get_configuration_from(dir.path());
        std::env::remove_var("APP_SERVER__PORT");

        let config = config.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
