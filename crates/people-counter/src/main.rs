//! People Counter - Main Entry Point
//!
//! ```bash
//! people-counter --model models/person-detection-retail-0013.onnx -p 0.6 frames/*.jpg
//! people-counter --config runner.toml -n 4 frames/*.png
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use model_runner::{ModelRunner, RunnerConfig};
use people_counter::{
    init_logging, parse_detections, preprocess, run_pipelined, CounterError, DetectionConfig,
    FrameReport, Summary,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "people-counter",
    about = "Count people in images with an SSD person detector",
    version
)]
struct Cli {
    /// Path to the network descriptor (weights are read from <model>.bin)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Target device: CPU, GPU, MYRIAD, HDDL, FPGA, HETERO:<list> or MULTI:<list>
    #[arg(short, long)]
    device: Option<String>,

    /// Kernel library for layers the device does not support
    #[arg(short = 'l', long)]
    extension: Option<PathBuf>,

    /// Runner configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent request slots
    #[arg(short = 'n', long)]
    requests: Option<usize>,

    /// Minimum detection confidence
    #[arg(short, long, default_value_t = 0.5)]
    prob_threshold: f32,

    /// Only count detections with this class label
    #[arg(long)]
    person_label: Option<u32>,

    /// Enable verbose logging (repeat for more: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Images to process, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

impl Cli {
    /// Configuration file and environment, overridden by flags
    fn runner_config(&self) -> anyhow::Result<RunnerConfig> {
        let mut config = RunnerConfig::load(self.config.as_deref())?;
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(device) = &self.device {
            config.device = device.parse()?;
        }
        if let Some(extension) = &self.extension {
            config.extension_path = Some(extension.clone());
        }
        if let Some(requests) = self.requests {
            config.num_requests = requests;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("=== People Counter v{} ===", env!("CARGO_PKG_VERSION"));

    let config = cli.runner_config()?;
    let mut runner = ModelRunner::from_config(&config).context("failed to load model")?;
    let input_shape = runner.input_shape()?;
    info!("Network input shape: {:?}", input_shape);

    let detection = DetectionConfig {
        prob_threshold: cli.prob_threshold,
        person_label: cli.person_label,
    };

    let frames = cli.inputs.iter().map(|path| -> Result<_, CounterError> {
        let image = image::open(path)
            .map_err(|e| CounterError::ImageProcessing(format!("{}: {}", path.display(), e)))?;
        let tensor = preprocess(&image, &input_shape)?;
        Ok(((path.clone(), image.width(), image.height()), tensor))
    });

    let mut summary = Summary::default();
    run_pipelined(&mut runner, frames, |index, (path, width, height), output| {
        let boxes = parse_detections(&output, width, height, &detection)?;
        let report = FrameReport::new(index, path, boxes);
        summary.record(&report);

        let line = serde_json::to_string(&report)
            .map_err(|e| CounterError::DetectionOutput(e.to_string()))?;
        println!("{}", line);
        Ok(())
    })?;

    info!(
        "Processed {} frames, {} people total, at most {} in one frame",
        summary.frames, summary.total_count, summary.max_count
    );
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
