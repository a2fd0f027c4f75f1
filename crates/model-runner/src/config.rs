//! Runner configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Device, RunnerError};

/// Environment prefix for overrides, e.g. `MODEL_RUNNER_DEVICE=CPU`
pub const ENV_PREFIX: &str = "MODEL_RUNNER";

/// Model runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Network descriptor; weights are read from the same path with `.bin`
    pub model_path: Option<PathBuf>,

    /// Target device identifier
    pub device: Device,

    /// Library registered when the device lacks kernels for some layers
    pub extension_path: Option<PathBuf>,

    /// Number of concurrent request slots
    pub num_requests: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            device: Device::Cpu,
            extension_path: None,
            num_requests: 1,
        }
    }
}

impl RunnerConfig {
    /// Load from an optional file, then `MODEL_RUNNER_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, RunnerError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load with a custom environment prefix
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, RunnerError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            debug!("Reading runner configuration from {}", path.display());
            if !path.is_file() {
                return Err(RunnerError::MissingFile(path.to_path_buf()));
            }
            builder = builder.add_source(::config::File::from(path));
        }

        let settings = builder
            .add_source(::config::Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?;
        let config: RunnerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.num_requests == 0 {
            return Err(RunnerError::Config("num_requests must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.num_requests, 1);
        assert!(config.model_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.toml");
        std::fs::write(
            &path,
            "model_path = \"models/person-detection.onnx\"\ndevice = \"HETERO:GPU,CPU\"\nnum_requests = 4\n",
        )
        .unwrap();

        let config = RunnerConfig::load_with_prefix(Some(&path), "MODEL_RUNNER_TEST_FILE").unwrap();
        assert_eq!(config.model_path, Some(PathBuf::from("models/person-detection.onnx")));
        assert_eq!(config.device, Device::Hetero(vec![Device::Gpu, Device::Cpu]));
        assert_eq!(config.num_requests, 4);
        assert_eq!(config.extension_path, None);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.toml");
        std::fs::write(&path, "device = \"CPU\"\nnum_requests = 2\n").unwrap();

        std::env::set_var("MODEL_RUNNER_TEST_ENV_NUM_REQUESTS", "3");
        let config = RunnerConfig::load_with_prefix(Some(&path), "MODEL_RUNNER_TEST_ENV").unwrap();
        std::env::remove_var("MODEL_RUNNER_TEST_ENV_NUM_REQUESTS");

        assert_eq!(config.num_requests, 3);
        assert_eq!(config.device, Device::Cpu);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "num_requests = 0\n").unwrap();
        assert!(matches!(
            RunnerConfig::load_with_prefix(Some(&path), "MODEL_RUNNER_TEST_ZERO"),
            Err(RunnerError::Config(_))
        ));

        let path = dir.path().join("device.toml");
        std::fs::write(&path, "device = \"TPU\"\n").unwrap();
        assert!(RunnerConfig::load_with_prefix(Some(&path), "MODEL_RUNNER_TEST_DEVICE").is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = RunnerConfig::load_with_prefix(
            Some(Path::new("/nonexistent/runner.toml")),
            "MODEL_RUNNER_TEST_MISSING",
        );
        assert!(matches!(result, Err(RunnerError::MissingFile(_))));
    }
}
