use crate::engine::BiometricEngine;
use crate::error::Result;
use crate::indexer::FaceIndexer;
use crate::labels::{read_image, LabelDetector};
use crate::matcher::FaceMatcher;
use crate::store::{IdentityStore, ObjectStore};
use crate::types::{
    CollisionPolicy, FaceDetail, FaceId, Matches, ObjectMetadata, PortraitMatch,
    RepresentativeMatch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Names fixed at startup and shared by every pipeline operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub collection: String,
    pub full_name_attribute: String,
    pub collision_policy: CollisionPolicy,
}

/// Identity resolution pipeline over one collection.
///
/// Every call is synchronous and chains engine, identity store and object
/// store strictly in that order. Nothing is retried.
pub struct Pipeline {
    config: PipelineConfig,
    engine: Arc<dyn BiometricEngine>,
    identities: Arc<dyn IdentityStore>,
    objects: Arc<dyn ObjectStore>,
    indexer: FaceIndexer,
    matcher: FaceMatcher,
    labels: LabelDetector,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        engine: Arc<dyn BiometricEngine>,
        identities: Arc<dyn IdentityStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let indexer = FaceIndexer::new(
            engine.clone(),
            identities.clone(),
            &config.collection,
            &config.full_name_attribute,
        );
        let matcher = FaceMatcher::new(
            engine.clone(),
            identities.clone(),
            objects.clone(),
            &config.collection,
            &config.full_name_attribute,
        )
        .with_policy(config.collision_policy);
        let labels = LabelDetector::new(engine.clone());

        Self {
            config,
            engine,
            identities,
            objects,
            indexer,
            matcher,
            labels,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn index(&self, image: &[u8], label: &str) -> Result<usize> {
        self.indexer.index(image, label)
    }

    pub fn index_file(&self, path: &Path, label: &str) -> Result<usize> {
        let image = read_image(path)?;
        self.indexer.index(&image, label)
    }

    pub fn match_faces(&self, image: &[u8]) -> Result<Matches> {
        self.matcher.match_faces(image)
    }

    pub fn match_file(&self, path: &Path) -> Result<Matches> {
        let image = read_image(path)?;
        self.matcher.match_faces(&image)
    }

    pub fn match_with_image(&self, image: &[u8]) -> Result<RepresentativeMatch> {
        self.matcher.match_with_image(image)
    }

    pub fn match_with_images(&self, image: &[u8]) -> Result<Vec<PortraitMatch>> {
        self.matcher.match_with_images(image)
    }

    pub fn detect_labels(&self, image: &[u8]) -> Result<BTreeMap<String, f32>> {
        self.labels.detect_labels(image)
    }

    pub fn detect_labels_in_file(&self, path: &Path) -> Result<BTreeMap<String, f32>> {
        self.labels.detect_labels_in_file(path)
    }

    pub fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceDetail>> {
        let faces = self.engine.detect_faces(image)?;
        for face in &faces {
            tracing::info!(
                confidence = face.confidence,
                left = face.bounding_box.left,
                top = face.bounding_box.top,
                width = face.bounding_box.width,
                height = face.bounding_box.height,
                "face detected"
            );
        }
        Ok(faces)
    }

    /// Store a portrait under `key`, tagged with the identity it shows.
    pub fn upload_portrait(&self, key: &str, image: &[u8], identity: &str) -> Result<()> {
        let metadata =
            ObjectMetadata::from([(self.config.full_name_attribute.clone(), identity.to_string())]);
        self.objects.put(key, image, &metadata)?;
        tracing::info!(key, identity, bytes = image.len(), "portrait uploaded");
        Ok(())
    }

    pub fn delete_faces(&self, face_ids: &[FaceId]) -> Result<()> {
        crate::admin::delete_faces(self.engine.as_ref(), face_ids, &self.config.collection)
    }

    pub fn delete_identity(&self, face_id: &FaceId) -> Result<()> {
        crate::admin::delete_identity(self.identities.as_ref(), face_id)
    }
}
