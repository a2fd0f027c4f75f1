//! People Counter
//!
//! Counts people in frames using an SSD-style person detector:
//! - Frame preprocessing to the network input layout
//! - Frames pipelined across the runner's request slots
//! - Detection parsing and per-frame reports

pub mod detection;
pub mod pipeline;
pub mod preprocess;
pub mod report;

pub use detection::{parse_detections, Detection, DetectionConfig};
pub use pipeline::{run_pipelined, RequestSlots};
pub use preprocess::preprocess;
pub use report::{FrameReport, Summary};

use model_runner::RunnerError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// People counter error types
#[derive(Error, Debug)]
pub enum CounterError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Unsupported input layout: {0}")]
    InputLayout(String),

    #[error("Unexpected detection output: {0}")]
    DetectionOutput(String),
}

/// Initialize logging on stderr; `verbose` raises the level per repeat
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}
