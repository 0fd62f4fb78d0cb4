use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub output: OutputConfig,
    pub api: ApiConfig,
    pub telemetry: TelemetryConfig,
}

/// Object storage target for the S3 writer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub key_prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub aws_profile: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl StorageConfig {
    /// Static credentials, if both halves are configured. Empty values count as unset.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (non_empty(&self.access_key_id), non_empty(&self.secret_access_key)) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        // Load default configuration
        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        // Layer on config file if it exists
        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        // Layer on environment variables (INGEST_ prefix)
        builder = builder.add_source(
            Environment::with_prefix("INGEST")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Config = builder.build()?.try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.is_empty() {
            return Err(ConfigError::Message("storage.bucket is required".into()));
        }

        let key_id = non_empty(&self.storage.access_key_id);
        let secret = non_empty(&self.storage.secret_access_key);
        if key_id.is_some() != secret.is_some() {
            return Err(ConfigError::Message(
                "storage.access_key_id and storage.secret_access_key must be set together".into(),
            ));
        }

        if self.api.base_url.is_empty() {
            return Err(ConfigError::Message("api.base_url is required".into()));
        }

        if self.api.max_retries == 0 {
            return Err(ConfigError::Message(
                "api.max_retries must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                bucket: "hello-datalake-mercado-bitcoin".to_string(),
                key_prefix: "mercado_bitcoin".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
                aws_profile: None,
                access_key_id: None,
                secret_access_key: None,
            },
            output: OutputConfig {
                base_dir: PathBuf::from("."),
            },
            api: ApiConfig {
                base_url: "https://www.mercadobitcoin.net/api".to_string(),
                timeout_secs: 30,
                max_retries: 3,
                retry_base_delay_ms: 1000,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                log_format: LogFormat::Pretty,
                metrics_enabled: false,
                metrics_port: 9090,
            },
        }
    }
}
