//! Engine seam
//!
//! The runner talks to the inference runtime only through these traits.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::{Device, NetworkFiles, RunnerError};

/// Name and shape of a network input or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    pub shape: Vec<usize>,
}

/// Status code of a request slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Request completed and its outputs are readable
    Ok,
    /// Request ran and failed
    GeneralError,
    /// Request is still running
    ResultNotReady,
    /// Slot was never started
    InferNotStarted,
}

impl RequestStatus {
    /// Numeric status code
    pub fn code(&self) -> i32 {
        match self {
            RequestStatus::Ok => 0,
            RequestStatus::GeneralError => -1,
            RequestStatus::ResultNotReady => -9,
            RequestStatus::InferNotStarted => -11,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RequestStatus::Ok)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Ok => "OK",
            RequestStatus::GeneralError => "GENERAL_ERROR",
            RequestStatus::ResultNotReady => "RESULT_NOT_READY",
            RequestStatus::InferNotStarted => "INFER_NOT_STARTED",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// A network read from disk, not yet bound to a device
pub trait Network {
    /// Every layer name, in graph order
    fn layer_names(&self) -> Vec<String>;

    /// Declared inputs, in declaration order
    fn inputs(&self) -> Vec<TensorInfo>;

    /// Declared outputs, in declaration order
    fn outputs(&self) -> Vec<TensorInfo>;
}

/// A network bound to a device with a fixed pool of request slots
pub trait ExecutableNetwork {
    /// Size of the request slot pool
    fn num_requests(&self) -> usize;

    /// Outputs with shapes resolved for the bound inputs
    fn outputs(&self) -> Vec<TensorInfo>;

    /// Submit named inputs to a slot without waiting for the result
    fn start_async(
        &mut self,
        request_id: usize,
        inputs: Vec<(String, ArrayD<f32>)>,
    ) -> Result<(), RunnerError>;

    /// Block until the slot completes or fails
    fn wait(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError>;

    /// Current status of the slot without blocking
    fn status(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError>;

    /// Read a named output of a completed slot
    fn output(&self, request_id: usize, name: &str) -> Result<ArrayD<f32>, RunnerError>;
}

/// Handle to an inference runtime
pub trait InferenceEngine {
    type Network: Network;
    type Executable: ExecutableNetwork;

    /// Read a descriptor and its weights
    fn read_network(&self, files: &NetworkFiles) -> Result<Self::Network, RunnerError>;

    /// Names of the layers `device` can execute
    fn query_network(
        &self,
        network: &Self::Network,
        device: &Device,
    ) -> Result<HashSet<String>, RunnerError>;

    /// Register a library providing kernels for otherwise unsupported layers
    fn add_extension(&mut self, path: &Path, device: &Device) -> Result<(), RunnerError>;

    /// Bind the network to `device` with `num_requests` slots
    fn load_network(
        &mut self,
        network: &Self::Network,
        device: &Device,
        num_requests: usize,
    ) -> Result<Self::Executable, RunnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RequestStatus::Ok.code(), 0);
        assert_eq!(RequestStatus::GeneralError.code(), -1);
        assert_eq!(RequestStatus::ResultNotReady.code(), -9);
        assert_eq!(RequestStatus::InferNotStarted.code(), -11);
        assert!(RequestStatus::Ok.is_ok());
        assert!(!RequestStatus::ResultNotReady.is_ok());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RequestStatus::InferNotStarted.to_string(), "INFER_NOT_STARTED (-11)");
    }
}
