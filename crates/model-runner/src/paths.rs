//! Network descriptor and weights file pairing

use std::path::{Path, PathBuf};

use crate::RunnerError;

/// Extension of the binary weights file paired with every descriptor
pub const WEIGHTS_EXTENSION: &str = "bin";

/// Descriptor path plus the weights path derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFiles {
    /// Model description (graph topology)
    pub descriptor: PathBuf,
    /// Binary weights stored next to the descriptor
    pub weights: PathBuf,
}

impl NetworkFiles {
    /// Pair a descriptor with its weights file
    pub fn new(descriptor: impl Into<PathBuf>) -> Self {
        let descriptor = descriptor.into();
        let weights = weights_path_for(&descriptor);
        Self { descriptor, weights }
    }

    /// Fail with [`RunnerError::MissingFile`] unless both files exist
    pub fn ensure_present(&self) -> Result<(), RunnerError> {
        for path in [&self.descriptor, &self.weights] {
            if !path.is_file() {
                return Err(RunnerError::MissingFile(path.clone()));
            }
        }
        Ok(())
    }
}

/// Replace the last extension of `descriptor` with `.bin`.
///
/// A descriptor without an extension gets `.bin` appended.
pub fn weights_path_for(descriptor: &Path) -> PathBuf {
    descriptor.with_extension(WEIGHTS_EXTENSION)
}
