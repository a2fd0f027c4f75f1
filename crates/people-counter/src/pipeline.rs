//! Frame pipelining over request slots
//!
//! Frames go to slots round-robin. A slot is waited on and read just before
//! it is reused, so results come back in frame order. Frames are pulled from
//! the source only when a slot is about to take them, so at most one frame
//! per slot is held in memory.

use std::collections::VecDeque;

use model_runner::{InferenceEngine, ModelRunner, RequestStatus, RunnerError};
use ndarray::ArrayD;
use tracing::{debug, warn};

use crate::CounterError;

/// Indexed request slots a pipeline can drive
pub trait RequestSlots {
    fn slot_count(&self) -> Result<usize, RunnerError>;
    fn start(&mut self, image: ArrayD<f32>, request_id: usize) -> Result<(), RunnerError>;
    fn wait(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError>;
    fn output(&self, request_id: usize) -> Result<ArrayD<f32>, RunnerError>;
}

impl<E: InferenceEngine> RequestSlots for ModelRunner<E> {
    fn slot_count(&self) -> Result<usize, RunnerError> {
        self.num_requests()
    }

    fn start(&mut self, image: ArrayD<f32>, request_id: usize) -> Result<(), RunnerError> {
        self.start_inference(image, request_id)
    }

    fn wait(&mut self, request_id: usize) -> Result<RequestStatus, RunnerError> {
        ModelRunner::wait(self, request_id)
    }

    fn output(&self, request_id: usize) -> Result<ArrayD<f32>, RunnerError> {
        ModelRunner::output(self, request_id)
    }
}

fn collect<S, T, F>(
    slots: &mut S,
    frame: usize,
    request_id: usize,
    tag: T,
    sink: &mut F,
) -> Result<(), CounterError>
where
    S: RequestSlots,
    F: FnMut(usize, T, ArrayD<f32>) -> Result<(), CounterError>,
{
    let status = slots.wait(request_id)?;
    if !status.is_ok() {
        warn!("Frame {} on request {} finished with {}", frame, request_id, status);
    }
    let output = slots.output(request_id)?;
    sink(frame, tag, output)
}

/// Run every frame through the slots and hand outputs to `sink` in frame order.
///
/// Each frame carries a tag that is returned to `sink` alongside its output.
/// A frame that fails to load stops the pipeline.
pub fn run_pipelined<S, T, I, F>(slots: &mut S, frames: I, mut sink: F) -> Result<usize, CounterError>
where
    S: RequestSlots,
    I: IntoIterator<Item = Result<(T, ArrayD<f32>), CounterError>>,
    F: FnMut(usize, T, ArrayD<f32>) -> Result<(), CounterError>,
{
    let pool = slots.slot_count()?;
    if pool == 0 {
        return Err(RunnerError::Config("no request slots".to_string()).into());
    }
    let mut in_flight: VecDeque<(usize, usize, T)> = VecDeque::with_capacity(pool);
    let mut processed = 0;

    for (frame, item) in frames.into_iter().enumerate() {
        let (tag, image) = item?;
        let request_id = frame % pool;
        if in_flight.len() == pool {
            if let Some((done, slot, done_tag)) = in_flight.pop_front() {
                collect(slots, done, slot, done_tag, &mut sink)?;
            }
        }

        debug!("Frame {} -> request {}", frame, request_id);
        slots.start(image, request_id)?;
        in_flight.push_back((frame, request_id, tag));
        processed += 1;
    }

    while let Some((done, slot, tag)) = in_flight.pop_front() {
        collect(slots, done, slot, tag, &mut sink)?;
    }

    Ok(processed)
}
