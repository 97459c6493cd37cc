//! Server configuration.

use serde::{Deserialize, Serialize};

use pulse_core::{Error, PipelineConfig, Result};

/// CORS configuration for browser-based access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // Default: disabled (secure-by-default).
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// Configuration for the Pulse API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled the binary falls back to in-memory storage and pretty
    /// log output; production deployments must run with `debug` off.
    pub debug: bool,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Query engine gateway base URL.
    #[serde(default)]
    pub query_engine_url: Option<String>,

    /// Inference gateway base URL.
    #[serde(default)]
    pub inference_url: Option<String>,

    /// Clustering gateway base URL.
    #[serde(default)]
    pub cluster_url: Option<String>,

    /// Pipeline configuration handed to `pulse-flow`.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            cors: CorsConfig::default(),
            query_engine_url: None,
            inference_url: None,
            cluster_url: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This is the canonical runtime configuration path for serverless
    /// deployments.
    ///
    /// Supported env vars:
    /// - `PULSE_HTTP_PORT`
    /// - `PULSE_DEBUG`
    /// - `PULSE_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `PULSE_CORS_MAX_AGE_SECONDS`
    /// - `PULSE_QUERY_ENGINE_URL`
    /// - `PULSE_INFERENCE_URL`
    /// - `PULSE_CLUSTER_URL`
    /// - `PULSE_STORAGE_BUCKET`
    /// - `PULSE_DATABASE`
    /// - `PULSE_TABLE`
    /// - `PULSE_MODEL_ID`
    /// - `PULSE_UPLOAD_FILE_NAME`
    /// - `PULSE_UPLOAD_CONTENT_TYPE`
    /// - `PULSE_POLL_INTERVAL_SECS`
    /// - `PULSE_POLL_TIMEOUT_SECS`
    /// - `PULSE_RETRY_ATTEMPTS`
    /// - `PULSE_RETRY_BASE_MILLIS`
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable is present but cannot be
    /// parsed.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("PULSE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("PULSE_DEBUG")? {
            config.debug = debug;
        }
        if let Some(origins) = env_string("PULSE_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_cors_allowed_origins(&origins);
        }
        if let Some(max_age) = env_u64("PULSE_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        config.query_engine_url = env_string("PULSE_QUERY_ENGINE_URL");
        config.inference_url = env_string("PULSE_INFERENCE_URL");
        config.cluster_url = env_string("PULSE_CLUSTER_URL");

        if let Some(bucket) = env_string("PULSE_STORAGE_BUCKET") {
            config.pipeline.bucket = bucket;
        }
        if let Some(database) = env_string("PULSE_DATABASE") {
            config.pipeline.database = database;
        }
        if let Some(table) = env_string("PULSE_TABLE") {
            config.pipeline.table = table;
        }
        if let Some(model_id) = env_string("PULSE_MODEL_ID") {
            config.pipeline.model_id = model_id;
        }
        if let Some(file_name) = env_string("PULSE_UPLOAD_FILE_NAME") {
            config.pipeline.upload_file_name = file_name;
        }
        if let Some(content_type) = env_string("PULSE_UPLOAD_CONTENT_TYPE") {
            config.pipeline.upload_content_type = content_type;
        }
        if let Some(secs) = env_u64("PULSE_POLL_INTERVAL_SECS")? {
            config.pipeline.poll_interval_secs = secs;
        }
        if let Some(secs) = env_u64("PULSE_POLL_TIMEOUT_SECS")? {
            config.pipeline.poll_timeout_secs = secs;
        }
        if let Some(attempts) = env_u64("PULSE_RETRY_ATTEMPTS")? {
            config.pipeline.retry_attempts = u32::try_from(attempts)
                .map_err(|_| Error::InvalidInput("PULSE_RETRY_ATTEMPTS too large".to_string()))?;
        }
        if let Some(millis) = env_u64("PULSE_RETRY_BASE_MILLIS")? {
            config.pipeline.retry_base_millis = millis;
        }

        Ok(config)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn parse_cors_allowed_origins(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed == "*" {
        return vec!["*".to_string()];
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_values() {
        assert!(parse_bool("TEST", "true").unwrap());
        assert!(parse_bool("TEST", "1").unwrap());
        assert!(!parse_bool("TEST", "FALSE").unwrap());
        assert!(!parse_bool("TEST", "no").unwrap());
        assert!(parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn cors_origins_parse_star_and_lists() {
        assert_eq!(parse_cors_allowed_origins("*"), vec!["*".to_string()]);
        assert_eq!(
            parse_cors_allowed_origins("https://a.test, https://b.test"),
            vec!["https://a.test".to_string(), "https://b.test".to_string()]
        );
        assert!(parse_cors_allowed_origins("  ").is_empty());
    }

    #[test]
    fn default_config_carries_pipeline_defaults() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert!(!config.debug);
        assert_eq!(config.pipeline.upload_file_name, "survey.csv");
        assert!(config.cors.allowed_origins.is_empty());
    }
}
