use crate::engine::BiometricEngine;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub const MAX_LABELS: u32 = 100;
pub const MIN_LABEL_CONFIDENCE: f32 = 60.0;

/// Generic image label detection through the biometric engine.
pub struct LabelDetector {
    engine: Arc<dyn BiometricEngine>,
}

impl LabelDetector {
    pub fn new(engine: Arc<dyn BiometricEngine>) -> Self {
        Self { engine }
    }

    /// Labels of `image` with at least [`MIN_LABEL_CONFIDENCE`], at most [`MAX_LABELS`] of them.
    ///
    /// Both bounds are re-applied to the engine's answer. A label reported
    /// twice keeps its later confidence.
    pub fn detect_labels(&self, image: &[u8]) -> Result<BTreeMap<String, f32>> {
        let labels = self
            .engine
            .detect_labels(image, MAX_LABELS, MIN_LABEL_CONFIDENCE)?;
        let reported = labels.len();

        let detected: BTreeMap<String, f32> = labels
            .into_iter()
            .filter(|l| l.confidence >= MIN_LABEL_CONFIDENCE)
            .take(MAX_LABELS as usize)
            .map(|l| (l.name, l.confidence))
            .collect();

        tracing::debug!(reported, kept = detected.len(), "labels detected");
        Ok(detected)
    }

    pub fn detect_labels_in_file(&self, path: &Path) -> Result<BTreeMap<String, f32>> {
        let image = read_image(path)?;
        self.detect_labels(&image)
    }
}

/// Read a local image file, mapping failures to an input fault.
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::InputIo {
        path: path.to_path_buf(),
        source,
    })
}
