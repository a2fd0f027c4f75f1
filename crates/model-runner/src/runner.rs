//! Model Runner
//!
//! Owns an engine handle and, once loaded, the executable network bound to
//! the requested device. Request slots are addressed by index; the caller
//! decides which slot to start, wait on and read.

use std::path::Path;

use ndarray::ArrayD;
use tracing::{debug, info, warn};

use crate::engine::{ExecutableNetwork, InferenceEngine, Network, RequestStatus, TensorInfo};
use crate::{unsupported_layers, Device, NetworkFiles, RunnerConfig, RunnerError, TractEngine};

/// Network state after a successful load
struct LoadedNetwork<E: InferenceEngine> {
    files: NetworkFiles,
    device: Device,
    executable: E::Executable,
    input: TensorInfo,
    output: TensorInfo,
}

/// Adapter that loads a network and drives its request slots
pub struct ModelRunner<E: InferenceEngine> {
    engine: E,
    num_requests: usize,
    loaded: Option<LoadedNetwork<E>>,
}

impl ModelRunner<TractEngine> {
    /// Build a tract-backed runner and load the configured model
    pub fn from_config(config: &RunnerConfig) -> Result<Self, RunnerError> {
        config.validate()?;
        let model_path = config
            .model_path
            .as_deref()
            .ok_or_else(|| RunnerError::Config("model_path is not set".to_string()))?;

        let mut runner = Self::new(TractEngine::new()).with_requests(config.num_requests);
        runner.load(model_path, &config.device, config.extension_path.as_deref())?;
        Ok(runner)
    }
}

impl<E: InferenceEngine> ModelRunner<E> {
    /// Create an unloaded runner with a single request slot
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            num_requests: 1,
            loaded: None,
        }
    }

    /// Set the number of request slots created by the next load
    pub fn with_requests(mut self, num_requests: usize) -> Self {
        self.num_requests = num_requests;
        self
    }

    /// Read the network, check layer support and bind it to `device`.
    ///
    /// Unsupported layers are logged; if an extension library is given it is
    /// registered before binding. Engine errors are returned unchanged.
    pub fn load(
        &mut self,
        model_path: impl AsRef<Path>,
        device: &Device,
        extension: Option<&Path>,
    ) -> Result<(), RunnerError> {
        let files = NetworkFiles::new(model_path.as_ref());
        info!("Loading model {} on {}", files.descriptor.display(), device);

        let network = self.engine.read_network(&files)?;

        let supported = self.engine.query_network(&network, device)?;
        let declared = network.layer_names();
        let unsupported = unsupported_layers(declared.iter().map(String::as_str), &supported);

        if !unsupported.is_empty() {
            warn!("Unsupported layers found: {:?}", unsupported);
            match extension {
                Some(path) => {
                    info!("Registering extension {} for {}", path.display(), device);
                    self.engine.add_extension(path, device)?;
                }
                None => warn!("No extension library given; binding may fail"),
            }
        }

        let executable = self.engine.load_network(&network, device, self.num_requests)?;

        let input = network.inputs().into_iter().next().ok_or(RunnerError::NoInputs)?;
        let output = executable
            .outputs()
            .into_iter()
            .next()
            .ok_or(RunnerError::NoOutputs)?;

        debug!("Input '{}' {:?}, output '{}' {:?}", input.name, input.shape, output.name, output.shape);
        info!(
            "Model loaded: {} request slots on {}",
            executable.num_requests(),
            device
        );

        self.loaded = Some(LoadedNetwork {
            files,
            device: device.clone(),
            executable,
            input,
            output,
        });
        Ok(())
    }

    fn loaded(&self) -> Result<&LoadedNetwork<E>, RunnerError> {
        self.loaded.as_ref().ok_or(RunnerError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedNetwork<E>, RunnerError> {
        self.loaded.as_mut().ok_or(RunnerError::NotLoaded)
    }

    /// Check if a network is loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Descriptor and weights of the loaded network
    pub fn files(&self) -> Option<&NetworkFiles> {
        self.loaded.as_ref().map(|l| &l.files)
    }

    /// Device the network is bound to
    pub fn device(&self) -> Option<&Device> {
        self.loaded.as_ref().map(|l| &l.device)
    }

    /// Engine handle
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Size of the request slot pool
    pub fn num_requests(&self) -> Result<usize, RunnerError> {
        Ok(self.loaded()?.executable.num_requests())
    }

    /// Shape of the first network input
    pub fn input_shape(&self) -> Result<Vec<usize>, RunnerError> {
        Ok(self.loaded()?.input.shape.clone())
    }

    /// Shape of the first network output
    pub fn output_shape(&self) -> Result<Vec<usize>, RunnerError> {
        Ok(self.loaded()?.output.shape.clone())
    }

    /// Submit `image` to slot `request_id` and return without waiting
    pub fn start_inference(&mut self, image: ArrayD<f32>, request_id: usize) -> Result<(), RunnerError> {
        let loaded = self.loaded_mut()?;
        let input = loaded.input.name.clone();
        loaded.executable.start_async(request_id, vec![(input, image)])
    }

    /// Block until slot `request_id` completes or fails
    pub fn wait(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError> {
        let status = self.loaded_mut()?.executable.wait(request_id)?;
        debug!("Request {} finished with {}", request_id, status);
        Ok(status)
    }

    /// Status of slot `request_id` without blocking
    pub fn request_status(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError> {
        self.loaded_mut()?.executable.status(request_id)
    }

    /// First output of slot `request_id`
    pub fn output(&self, request_id: usize) -> Result<ArrayD<f32>, RunnerError> {
        let loaded = self.loaded()?;
        loaded.executable.output(request_id, &loaded.output.name)
    }

    /// Run `image` synchronously on slot 0
    pub fn infer(&mut self, image: ArrayD<f32>) -> Result<ArrayD<f32>, RunnerError> {
        self.start_inference(image, 0)?;
        self.wait(0)?;
        self.output(0)
    }
}
