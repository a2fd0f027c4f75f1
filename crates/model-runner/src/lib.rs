//! Model Runner
//!
//! Thin adapter around an inference engine:
//! - Reads a network descriptor and its paired weights file
//! - Binds the network to a compute device
//! - Drives a fixed pool of asynchronous request slots
//!
//! The bundled backend runs ONNX graphs on the CPU through tract.

pub mod config;
pub mod device;
pub mod engine;
pub mod layers;
pub mod paths;
pub mod runner;
pub mod tract_backend;

pub use config::RunnerConfig;
pub use device::Device;
pub use engine::{ExecutableNetwork, InferenceEngine, Network, RequestStatus, TensorInfo};
pub use layers::unsupported_layers;
pub use paths::NetworkFiles;
pub use runner::ModelRunner;
pub use tract_backend::{TractEngine, TractExecutableNetwork, TractNetwork};

use std::path::PathBuf;
use thiserror::Error;
use tract_onnx::prelude::TractError;

/// Errors raised while loading or driving a network
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Device not available: {0}")]
    DeviceUnavailable(String),

    #[error("Invalid device identifier: {0}")]
    InvalidDevice(String),

    #[error("Extension load failed: {0}")]
    Extension(String),

    #[error("Model not loaded")]
    NotLoaded,

    #[error("Network declares no inputs")]
    NoInputs,

    #[error("Network declares no outputs")]
    NoOutputs,

    #[error("Request {id} out of range (pool has {pool} slots)")]
    InvalidRequest { id: usize, pool: usize },

    #[error("Request {0} is still running")]
    RequestBusy(usize),

    #[error("Request {0} was never started")]
    RequestNotStarted(usize),

    #[error("Request {0} has not completed")]
    ResultNotReady(usize),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<TractError> for RunnerError {
    fn from(err: TractError) -> Self {
        RunnerError::ModelLoad(format!("{:#}", err))
    }
}

impl From<::config::ConfigError> for RunnerError {
    fn from(err: ::config::ConfigError) -> Self {
        RunnerError::Config(err.to_string())
    }
}
