//! SSD detection output parsing

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::CounterError;

/// Values per detection row: image_id, label, confidence, xmin, ymin, xmax, ymax
pub const DETECTION_FIELDS: usize = 7;

/// Detection filtering thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum confidence for a detection to count
    pub prob_threshold: f32,
    /// Only count this class label; `None` counts every label
    pub person_label: Option<u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            prob_threshold: 0.5,
            person_label: None,
        }
    }
}

/// A detection scaled to frame pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: u32,
    pub confidence: f32,
    /// Bounding box [xmin, ymin, xmax, ymax] in pixels
    pub bbox: [u32; 4],
}

/// Parse a `[1, 1, N, 7]` detection output for a `width` x `height` frame.
///
/// A row with a negative image id ends the list.
pub fn parse_detections(
    output: &ArrayD<f32>,
    width: u32,
    height: u32,
    config: &DetectionConfig,
) -> Result<Vec<Detection>, CounterError> {
    if output.shape().last() != Some(&DETECTION_FIELDS) {
        return Err(CounterError::DetectionOutput(format!(
            "expected rows of {} values, got shape {:?}",
            DETECTION_FIELDS,
            output.shape()
        )));
    }

    let values: Vec<f32> = output.iter().copied().collect();
    let scale = |v: f32, extent: u32| (v.clamp(0.0, 1.0) * extent as f32).round() as u32;

    let detections = values
        .chunks_exact(DETECTION_FIELDS)
        .take_while(|row| row[0] >= 0.0)
        .filter(|row| row[2] >= config.prob_threshold)
        .filter(|row| config.person_label.map_or(true, |label| row[1] as u32 == label))
        .map(|row| Detection {
            label: row[1] as u32,
            confidence: row[2],
            bbox: [
                scale(row[3], width),
                scale(row[4], height),
                scale(row[5], width),
                scale(row[6], height),
            ],
        })
        .collect();

    Ok(detections)
}
