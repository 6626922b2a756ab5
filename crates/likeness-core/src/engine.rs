//! Biometric engine capability.
//!
//! The engine is the only component that turns pixels into face identifiers.
//! Implementations are shared across concurrent callers, so every method
//! takes `&self`.

use crate::error::Result;
use crate::types::{FaceDetail, FaceId, Label, MatchCandidate};

pub trait BiometricEngine: Send + Sync {
    /// Detect and index every face in `image` into `collection`.
    fn index_faces(&self, image: &[u8], collection: &str) -> Result<Vec<FaceId>>;

    /// Search `collection` for faces similar to the largest face in `image`.
    /// Candidates arrive in provider order, typically descending confidence.
    fn search_faces_by_image(&self, image: &[u8], collection: &str)
        -> Result<Vec<MatchCandidate>>;

    fn detect_labels(&self, image: &[u8], max_labels: u32, min_confidence: f32)
        -> Result<Vec<Label>>;

    fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceDetail>>;

    fn delete_faces(&self, face_ids: &[FaceId], collection: &str) -> Result<()>;

    /// Create a collection, returning the provider's identifier for it.
    fn create_collection(&self, name: &str) -> Result<String>;

    fn delete_collection(&self, name: &str) -> Result<()>;

    fn list_collections(&self) -> Result<Vec<String>>;
}
