//! Per-frame reports and run summary

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Detection;

/// People counted in one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame: usize,
    pub path: PathBuf,
    pub count: usize,
    pub boxes: Vec<Detection>,
}

impl FrameReport {
    pub fn new(frame: usize, path: PathBuf, boxes: Vec<Detection>) -> Self {
        Self {
            frame,
            path,
            count: boxes.len(),
            boxes,
        }
    }
}

/// Totals over every processed frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub frames: usize,
    pub total_count: usize,
    pub max_count: usize,
}

impl Summary {
    pub fn record(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.total_count += report.count;
        self.max_count = self.max_count.max(report.count);
    }
}
