//! Tract-backed engine
//!
//! Reads ONNX descriptors whose initializers live in the paired weights file
//! and runs them on the CPU. Each executable network owns a tokio runtime
//! whose blocking pool executes the request slots.
//!
//! `wait` blocks on that runtime, so it must not be called from inside
//! another async runtime.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{ArrayD, IxDyn};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tract_onnx::data_resolver::{MmapDataResolver, ModelDataResolver};
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::infer::Factoid;
use tract_onnx::tract_hir::ops::unimpl::UnimplementedOp;

use crate::engine::{ExecutableNetwork, InferenceEngine, Network, RequestStatus, TensorInfo};
use crate::{Device, NetworkFiles, RunnerError};

type RunFn = dyn Fn(TVec<TValue>) -> TractResult<TVec<TValue>> + Send + Sync;
type RequestResult = Result<Vec<ArrayD<f32>>, String>;

/// Engine handle wrapping the tract ONNX framework
pub struct TractEngine {
    onnx: tract_onnx::Onnx,
}

impl TractEngine {
    /// Create the engine handle
    pub fn new() -> Self {
        info!("Creating tract inference engine");
        Self {
            onnx: tract_onnx::onnx(),
        }
    }

    /// Devices this engine can execute on
    pub fn available_devices(&self) -> Vec<Device> {
        vec![Device::Cpu]
    }

    /// Fail unless `device` runs on, or falls back to, an available device
    pub fn ensure_device(&self, device: &Device) -> Result<(), RunnerError> {
        let available = self.available_devices();
        if available.iter().any(|candidate| device.includes(candidate)) {
            return Ok(());
        }

        let names: Vec<String> = available.iter().map(Device::to_string).collect();
        warn!("Device {} not available, engine offers: {}", device, names.join(", "));
        Err(RunnerError::DeviceUnavailable(format!(
            "{} (available: {})",
            device,
            names.join(", ")
        )))
    }
}

impl Default for TractEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves every external initializer from the paired weights file.
///
/// Offsets and lengths come from the descriptor; the `location` it names is
/// ignored so a network always reads the weights it was paired with.
struct PairedWeights {
    weights: PathBuf,
}

impl ModelDataResolver for PairedWeights {
    fn read_bytes_from_path(
        &self,
        buf: &mut Vec<u8>,
        location: &Path,
        offset: usize,
        length: Option<usize>,
    ) -> TractResult<()> {
        if location != self.weights {
            debug!(
                "External data {} redirected to {}",
                location.display(),
                self.weights.display()
            );
        }

        let size = fs::metadata(&self.weights)?.len() as usize;
        let end = match length {
            Some(length) => offset.checked_add(length),
            None => Some(size),
        };
        match end {
            Some(end) if offset <= end && end <= size => {
                MmapDataResolver.read_bytes_from_path(buf, &self.weights, offset, length)
            }
            _ => Err(TractError::msg(format!(
                "{}: external data at offset {} (length {:?}) exceeds file size {}",
                self.weights.display(),
                offset,
                length,
                size
            ))),
        }
    }
}

/// ONNX graph read from disk
pub struct TractNetwork {
    model: InferenceModel,
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
}

impl TractNetwork {
    fn from_model(model: InferenceModel) -> TractResult<Self> {
        let inputs = model
            .input_outlets()?
            .iter()
            .map(|outlet| -> TractResult<TensorInfo> {
                Ok(TensorInfo {
                    name: model.node(outlet.node).name.clone(),
                    shape: declared_shape(model.outlet_fact(*outlet)?),
                })
            })
            .collect::<TractResult<Vec<_>>>()?;

        let outputs = model
            .output_outlets()?
            .iter()
            .map(|outlet| -> TractResult<TensorInfo> {
                let name = model
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| model.node(outlet.node).name.clone());
                Ok(TensorInfo {
                    name,
                    shape: declared_shape(model.outlet_fact(*outlet)?),
                })
            })
            .collect::<TractResult<Vec<_>>>()?;

        Ok(Self {
            model,
            inputs,
            outputs,
        })
    }
}

impl Network for TractNetwork {
    fn layer_names(&self) -> Vec<String> {
        self.model.nodes().iter().map(|node| node.name.clone()).collect()
    }

    fn inputs(&self) -> Vec<TensorInfo> {
        self.inputs.clone()
    }

    fn outputs(&self) -> Vec<TensorInfo> {
        self.outputs.clone()
    }
}

/// Symbolic or unknown dimensions resolve to 1
fn declared_shape(fact: &InferenceFact) -> Vec<usize> {
    fact.shape
        .dims()
        .map(|dim| {
            dim.concretize()
                .and_then(|d| d.to_i64().ok())
                .and_then(|d| usize::try_from(d).ok())
                .unwrap_or(1)
        })
        .collect()
}

impl InferenceEngine for TractEngine {
    type Network = TractNetwork;
    type Executable = TractExecutableNetwork;

    fn read_network(&self, files: &NetworkFiles) -> Result<TractNetwork, RunnerError> {
        files.ensure_present()?;
        debug!(
            "Reading network {} (weights {})",
            files.descriptor.display(),
            files.weights.display()
        );

        let onnx = tract_onnx::Onnx {
            provider: Arc::new(PairedWeights {
                weights: files.weights.clone(),
            }),
            ..self.onnx.clone()
        };
        let model = onnx.model_for_path(&files.descriptor).map_err(|e| {
            error!("Failed to read network {}: {:#}", files.descriptor.display(), e);
            RunnerError::ModelLoad(format!("{}: {:#}", files.descriptor.display(), e))
        })?;

        let network = TractNetwork::from_model(model)?;
        info!(
            "Network read: {} layers, {} inputs, {} outputs",
            network.model.nodes().len(),
            network.inputs.len(),
            network.outputs.len()
        );
        Ok(network)
    }

    fn query_network(
        &self,
        network: &TractNetwork,
        device: &Device,
    ) -> Result<HashSet<String>, RunnerError> {
        self.ensure_device(device)?;
        Ok(network
            .model
            .nodes()
            .iter()
            .filter(|node| !node.op_is::<UnimplementedOp>())
            .map(|node| node.name.clone())
            .collect())
    }

    fn add_extension(&mut self, path: &Path, device: &Device) -> Result<(), RunnerError> {
        if !path.is_file() {
            return Err(RunnerError::MissingFile(path.to_path_buf()));
        }
        warn!(
            "Cannot register {} for {}: tract does not load native kernel libraries",
            path.display(),
            device
        );
        Err(RunnerError::Extension(format!(
            "{}: native kernel libraries are not supported by the tract engine",
            path.display()
        )))
    }

    fn load_network(
        &mut self,
        network: &TractNetwork,
        device: &Device,
        num_requests: usize,
    ) -> Result<TractExecutableNetwork, RunnerError> {
        self.ensure_device(device)?;
        if num_requests == 0 {
            return Err(RunnerError::Config("num_requests must be at least 1".to_string()));
        }

        let mut model = network.model.clone();
        for (ix, input) in network.inputs.iter().enumerate() {
            model = model.with_input_fact(ix, f32::fact(input.shape.clone()).into())?;
        }

        let typed = model.into_optimized()?;
        let outputs = typed
            .output_outlets()?
            .iter()
            .map(|outlet| -> TractResult<TensorInfo> {
                let name = typed
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| typed.node(outlet.node).name.clone());
                let shape = typed
                    .outlet_fact(*outlet)?
                    .shape
                    .as_concrete()
                    .map(|dims| dims.to_vec())
                    .unwrap_or_default();
                Ok(TensorInfo { name, shape })
            })
            .collect::<TractResult<Vec<_>>>()?;

        let plan = typed.into_runnable()?;
        let run: Arc<RunFn> = Arc::new(move |inputs: TVec<TValue>| plan.run(inputs));

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(num_requests)
            .thread_name("infer-request")
            .build()
            .map_err(|e| RunnerError::Runtime(e.to_string()))?;

        info!("Network loaded on {} with {} request slots", device, num_requests);

        Ok(TractExecutableNetwork {
            run,
            runtime,
            inputs: network.inputs.clone(),
            outputs,
            slots: (0..num_requests).map(|_| Slot::Idle).collect(),
        })
    }
}

/// State of one request slot
enum Slot {
    Idle,
    Running(JoinHandle<RequestResult>),
    Completed(Vec<ArrayD<f32>>),
    Failed(String),
}

impl Slot {
    fn status(&self) -> RequestStatus {
        match self {
            Slot::Idle => RequestStatus::InferNotStarted,
            Slot::Running(_) => RequestStatus::ResultNotReady,
            Slot::Completed(_) => RequestStatus::Ok,
            Slot::Failed(_) => RequestStatus::GeneralError,
        }
    }

    fn settle(result: Result<RequestResult, tokio::task::JoinError>) -> Slot {
        match result {
            Ok(Ok(outputs)) => Slot::Completed(outputs),
            Ok(Err(message)) => Slot::Failed(message),
            Err(join) => Slot::Failed(format!("request task aborted: {}", join)),
        }
    }
}

/// Optimized plan plus its request slots
pub struct TractExecutableNetwork {
    run: Arc<RunFn>,
    runtime: Runtime,
    inputs: Vec<TensorInfo>,
    outputs: Vec<TensorInfo>,
    slots: Vec<Slot>,
}

impl TractExecutableNetwork {
    fn check_id(&self, request_id: usize) -> Result<(), RunnerError> {
        if request_id < self.slots.len() {
            Ok(())
        } else {
            Err(RunnerError::InvalidRequest {
                id: request_id,
                pool: self.slots.len(),
            })
        }
    }

    /// Order named inputs as the network declares them
    fn bind_inputs(&self, mut named: Vec<(String, ArrayD<f32>)>) -> Result<Vec<Tensor>, RunnerError> {
        self.inputs
            .iter()
            .map(|info| -> Result<Tensor, RunnerError> {
                let pos = named
                    .iter()
                    .position(|(name, _)| *name == info.name)
                    .ok_or_else(|| RunnerError::InferenceFailed(format!("missing input '{}'", info.name)))?;
                let (_, array) = named.swap_remove(pos);

                if array.shape() != info.shape.as_slice() {
                    return Err(RunnerError::InvalidInputShape {
                        expected: format!("{:?}", info.shape),
                        actual: format!("{:?}", array.shape()),
                    });
                }

                let data: Vec<f32> = array.iter().copied().collect();
                Tensor::from_shape(array.shape(), &data)
                    .map_err(|e| RunnerError::InferenceFailed(format!("{:#}", e)))
            })
            .collect()
    }
}

fn to_array(value: &TValue) -> TractResult<ArrayD<f32>> {
    let tensor = value.cast_to::<f32>()?;
    let data = tensor.as_slice::<f32>()?.to_vec();
    Ok(ArrayD::from_shape_vec(IxDyn(tensor.shape()), data)?)
}

impl ExecutableNetwork for TractExecutableNetwork {
    fn num_requests(&self) -> usize {
        self.slots.len()
    }

    fn outputs(&self) -> Vec<TensorInfo> {
        self.outputs.clone()
    }

    fn start_async(
        &mut self,
        request_id: usize,
        inputs: Vec<(String, ArrayD<f32>)>,
    ) -> Result<(), RunnerError> {
        self.check_id(request_id)?;
        if matches!(self.slots[request_id], Slot::Running(_)) {
            return Err(RunnerError::RequestBusy(request_id));
        }

        let tensors = self.bind_inputs(inputs)?;
        let run = Arc::clone(&self.run);
        let handle = self.runtime.spawn_blocking(move || -> RequestResult {
            let inputs: TVec<TValue> = tensors.into_iter().map(TValue::from).collect();
            let outputs = run(inputs).map_err(|e| format!("{:#}", e))?;
            outputs
                .iter()
                .map(|value| to_array(value).map_err(|e| format!("{:#}", e)))
                .collect()
        });

        debug!("Request {} started", request_id);
        self.slots[request_id] = Slot::Running(handle);
        Ok(())
    }

    fn wait(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError> {
        self.check_id(request_id)?;
        let slot = &mut self.slots[request_id];

        if let Slot::Running(_) = slot {
            if let Slot::Running(handle) = std::mem::replace(slot, Slot::Idle) {
                *slot = Slot::settle(self.runtime.block_on(handle));
            }
        }

        if let Slot::Failed(message) = slot {
            warn!("Request {} failed: {}", request_id, message);
        }
        Ok(slot.status())
    }

    fn status(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError> {
        self.check_id(request_id)?;
        let finished = matches!(&self.slots[request_id], Slot::Running(handle) if handle.is_finished());
        if finished {
            return self.wait(request_id);
        }
        Ok(self.slots[request_id].status())
    }

    fn output(&self, request_id: usize, name: &str) -> Result<ArrayD<f32>, RunnerError> {
        self.check_id(request_id)?;
        match &self.slots[request_id] {
            Slot::Completed(outputs) => {
                let index = self
                    .outputs
                    .iter()
                    .position(|info| info.name == name)
                    .ok_or_else(|| RunnerError::InferenceFailed(format!("unknown output '{}'", name)))?;
                outputs
                    .get(index)
                    .cloned()
                    .ok_or_else(|| RunnerError::InferenceFailed(format!("output '{}' not produced", name)))
            }
            Slot::Failed(message) => Err(RunnerError::InferenceFailed(message.clone())),
            Slot::Running(_) => Err(RunnerError::ResultNotReady(request_id)),
            Slot::Idle => Err(RunnerError::RequestNotStarted(request_id)),
        }
    }
}
