use crate::worker::{PipelineHandle, WorkerError};
use likeness_core::{ErrorKind, FaceId, PipelineConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;
use zbus::interface;

/// Detected face on the wire: `(left, top, width, height, confidence)`.
type FaceWire = (f64, f64, f64, f64, f64);

/// D-Bus interface for the Likeness identity resolution daemon.
///
/// Bus name: org.freedesktop.Likeness1
/// Object path: /org/freedesktop/Likeness1
pub struct LikenessService {
    handle: PipelineHandle,
    config: PipelineConfig,
    engine_service: String,
    requests: AtomicU64,
}

impl LikenessService {
    pub fn new(handle: PipelineHandle, config: PipelineConfig, engine_service: String) -> Self {
        Self {
            handle,
            config,
            engine_service,
            requests: AtomicU64::new(0),
        }
    }

    fn request_span(&self, method: &'static str) -> tracing::Span {
        self.requests.fetch_add(1, Ordering::Relaxed);
        tracing::info_span!("request", id = %uuid::Uuid::new_v4(), method)
    }
}

#[interface(name = "org.freedesktop.Likeness1")]
impl LikenessService {
    /// Index every face in `image` under `label`. Returns the number of faces indexed.
    async fn index(&self, label: &str, image: Vec<u8>) -> zbus::fdo::Result<u32> {
        let span = self.request_span("Index");
        async {
            tracing::info!(label, bytes = image.len(), "index requested");
            let indexed = self.handle.index(image, label.to_string()).await.map_err(to_fdo)?;
            Ok(u32::try_from(indexed).unwrap_or(u32::MAX))
        }
        .instrument(span)
        .await
    }

    /// Resolve faces in `image` to `(identity, confidence)` pairs.
    async fn match_image(&self, image: Vec<u8>) -> zbus::fdo::Result<Vec<(String, f64)>> {
        let span = self.request_span("MatchImage");
        async {
            let matches = self.handle.match_faces(image).await.map_err(to_fdo)?;
            tracing::info!(matches = matches.len(), "match served");
            Ok(matches
                .into_iter()
                .map(|m| (m.identity, f64::from(m.confidence)))
                .collect())
        }
        .instrument(span)
        .await
    }

    /// Resolve faces and return one representative `(identity, confidence, image)`.
    /// An empty identity means nothing matched; an empty image means no
    /// portrait was found.
    async fn match_with_image(&self, image: Vec<u8>) -> zbus::fdo::Result<(String, f64, Vec<u8>)> {
        let span = self.request_span("MatchWithImage");
        async {
            let chosen = self.handle.match_with_image(image).await.map_err(to_fdo)?;
            Ok((
                chosen.identity.unwrap_or_default(),
                chosen.confidence.map(f64::from).unwrap_or(0.0),
                chosen.image.unwrap_or_default(),
            ))
        }
        .instrument(span)
        .await
    }

    /// Every matched identity with `(identity, confidence, face_id, image)`.
    async fn match_with_images(
        &self,
        image: Vec<u8>,
    ) -> zbus::fdo::Result<Vec<(String, f64, String, Vec<u8>)>> {
        let span = self.request_span("MatchWithImages");
        async {
            let found = self.handle.match_with_images(image).await.map_err(to_fdo)?;
            Ok(found
                .into_iter()
                .map(|p| {
                    (
                        p.identity,
                        f64::from(p.confidence),
                        p.face_id.to_string(),
                        p.image.unwrap_or_default(),
                    )
                })
                .collect())
        }
        .instrument(span)
        .await
    }

    async fn detect_labels(&self, image: Vec<u8>) -> zbus::fdo::Result<Vec<(String, f64)>> {
        let span = self.request_span("DetectLabels");
        async {
            let labels = self.handle.detect_labels(image).await.map_err(to_fdo)?;
            Ok(labels
                .into_iter()
                .map(|(name, confidence)| (name, f64::from(confidence)))
                .collect())
        }
        .instrument(span)
        .await
    }

    async fn detect_faces(&self, image: Vec<u8>) -> zbus::fdo::Result<Vec<FaceWire>> {
        let span = self.request_span("DetectFaces");
        async {
            let faces = self.handle.detect_faces(image).await.map_err(to_fdo)?;
            Ok(faces
                .into_iter()
                .map(|f| {
                    let b = f.bounding_box;
                    (
                        f64::from(b.left),
                        f64::from(b.top),
                        f64::from(b.width),
                        f64::from(b.height),
                        f64::from(f.confidence),
                    )
                })
                .collect())
        }
        .instrument(span)
        .await
    }

    /// Store a portrait under `key` (normally a face id) tagged with `identity`.
    async fn upload_portrait(&self, key: &str, identity: &str, image: Vec<u8>) -> zbus::fdo::Result<()> {
        let span = self.request_span("UploadPortrait");
        async {
            self.handle
                .upload_portrait(key.to_string(), image, identity.to_string())
                .await
                .map_err(to_fdo)
        }
        .instrument(span)
        .await
    }

    async fn delete_faces(&self, face_ids: Vec<String>) -> zbus::fdo::Result<()> {
        let span = self.request_span("DeleteFaces");
        async {
            let ids = face_ids.into_iter().map(FaceId::from).collect();
            self.handle.delete_faces(ids).await.map_err(to_fdo)
        }
        .instrument(span)
        .await
    }

    async fn delete_identity(&self, face_id: &str) -> zbus::fdo::Result<()> {
        let span = self.request_span("DeleteIdentity");
        async {
            self.handle
                .delete_identity(FaceId::new(face_id))
                .await
                .map_err(to_fdo)
        }
        .instrument(span)
        .await
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "collection": self.config.collection,
            "full_name_attribute": self.config.full_name_attribute,
            "collision_policy": self.config.collision_policy,
            "engine": self.engine_service,
            "requests": self.requests.load(Ordering::Relaxed),
        })
        .to_string())
    }
}

fn to_fdo(err: WorkerError) -> zbus::fdo::Error {
    let message = err.to_string();
    let WorkerError::Pipeline(err) = err else {
        tracing::error!(error = %message, "pipeline unavailable");
        return zbus::fdo::Error::Failed(message);
    };
    tracing::warn!(error = %message, "request failed");
    match err.kind() {
        ErrorKind::InputIo => zbus::fdo::Error::InvalidArgs(message),
        ErrorKind::Provider => zbus::fdo::Error::Failed(message),
        ErrorKind::StoreNotFound => zbus::fdo::Error::FileNotFound(message),
        ErrorKind::RecordNotFound => zbus::fdo::Error::UnknownObject(message),
        ErrorKind::AlreadyExists => zbus::fdo::Error::FileExists(message),
    }
}
