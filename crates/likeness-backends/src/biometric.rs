//! Biometric engine client over D-Bus.
//!
//! The engine is a separate service owning the face collections. Every call
//! is a blocking method call with the connection's method timeout; nothing
//! is retried.

use crate::config::EngineSettings;
use crate::BackendError;
use likeness_core::{
    BiometricEngine, BoundingBox, Error, FaceDetail, FaceId, Label, MatchCandidate, ResourceKind,
    Result, Service,
};
use std::time::Duration;

/// Detected face on the wire: `(left, top, width, height, confidence)`.
type FaceWire = (f64, f64, f64, f64, f64);

// `#[zbus::proxy]` generates both `BiometricProxy` (async) and
// `BiometricProxyBlocking`. Only the blocking variant is used: the pipeline
// runs on its own thread.
#[zbus::proxy(
    interface = "org.freedesktop.Biometric1",
    default_service = "org.freedesktop.Biometric1",
    default_path = "/org/freedesktop/Biometric1"
)]
trait Biometric {
    async fn index_faces(&self, collection: &str, image: &[u8]) -> zbus::Result<Vec<String>>;

    async fn search_faces_by_image(
        &self,
        collection: &str,
        image: &[u8],
    ) -> zbus::Result<Vec<(String, f64)>>;

    async fn detect_labels(
        &self,
        image: &[u8],
        max_labels: u32,
        min_confidence: f64,
    ) -> zbus::Result<Vec<(String, f64)>>;

    async fn detect_faces(&self, image: &[u8]) -> zbus::Result<Vec<FaceWire>>;

    async fn delete_faces(&self, collection: &str, face_ids: &[String]) -> zbus::Result<()>;

    async fn create_collection(&self, name: &str) -> zbus::Result<String>;

    async fn delete_collection(&self, name: &str) -> zbus::Result<()>;

    async fn list_collections(&self) -> zbus::Result<Vec<String>>;
}

pub struct DbusBiometricEngine {
    proxy: BiometricProxyBlocking<'static>,
}

impl DbusBiometricEngine {
    /// Connect to the engine service. Fails fast if the bus is unreachable.
    pub fn connect(settings: &EngineSettings) -> std::result::Result<Self, BackendError> {
        let connect_err = |source| BackendError::EngineConnect {
            service: settings.service.clone(),
            source,
        };

        let builder = if settings.session_bus {
            zbus::blocking::connection::Builder::session()
        } else {
            zbus::blocking::connection::Builder::system()
        }
        .map_err(connect_err)?;

        let conn = builder
            .method_timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(connect_err)?;

        let proxy = BiometricProxyBlocking::builder(&conn)
            .destination(settings.service.clone())
            .and_then(|b| b.path(settings.path.clone()))
            .and_then(|b| b.build())
            .map_err(connect_err)?;

        tracing::info!(
            service = %settings.service,
            path = %settings.path,
            session_bus = settings.session_bus,
            "biometric engine connected"
        );
        Ok(Self { proxy })
    }
}

impl BiometricEngine for DbusBiometricEngine {
    fn index_faces(&self, image: &[u8], collection: &str) -> Result<Vec<FaceId>> {
        let ids = self
            .proxy
            .index_faces(collection, image)
            .map_err(|e| engine_fault("IndexFaces", ResourceKind::Collection, collection, e))?;
        Ok(ids.into_iter().map(FaceId::from).collect())
    }

    fn search_faces_by_image(&self, image: &[u8], collection: &str) -> Result<Vec<MatchCandidate>> {
        let found = self.proxy.search_faces_by_image(collection, image).map_err(|e| {
            engine_fault("SearchFacesByImage", ResourceKind::Collection, collection, e)
        })?;
        Ok(found
            .into_iter()
            .map(|(id, confidence)| MatchCandidate {
                face_id: FaceId::from(id),
                confidence: confidence as f32,
            })
            .collect())
    }

    fn detect_labels(&self, image: &[u8], max_labels: u32, min_confidence: f32) -> Result<Vec<Label>> {
        let labels = self
            .proxy
            .detect_labels(image, max_labels, f64::from(min_confidence))
            .map_err(|e| Error::provider(Service::Engine, "DetectLabels", e.to_string()))?;
        Ok(labels
            .into_iter()
            .map(|(name, confidence)| Label {
                name,
                confidence: confidence as f32,
            })
            .collect())
    }

    fn detect_faces(&self, image: &[u8]) -> Result<Vec<FaceDetail>> {
        let faces = self
            .proxy
            .detect_faces(image)
            .map_err(|e| Error::provider(Service::Engine, "DetectFaces", e.to_string()))?;
        Ok(faces.into_iter().map(face_from_wire).collect())
    }

    fn delete_faces(&self, face_ids: &[FaceId], collection: &str) -> Result<()> {
        let ids: Vec<String> = face_ids.iter().map(FaceId::to_string).collect();
        self.proxy
            .delete_faces(collection, &ids)
            .map_err(|e| engine_fault("DeleteFaces", ResourceKind::Collection, collection, e))
    }

    fn create_collection(&self, name: &str) -> Result<String> {
        self.proxy
            .create_collection(name)
            .map_err(|e| engine_fault("CreateCollection", ResourceKind::Collection, name, e))
    }

    fn delete_collection(&self, name: &str) -> Result<()> {
        self.proxy
            .delete_collection(name)
            .map_err(|e| engine_fault("DeleteCollection", ResourceKind::Collection, name, e))
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        self.proxy
            .list_collections()
            .map_err(|e| Error::provider(Service::Engine, "ListCollections", e.to_string()))
    }
}

fn face_from_wire((left, top, width, height, confidence): FaceWire) -> FaceDetail {
    FaceDetail {
        bounding_box: BoundingBox {
            left: left as f32,
            top: top as f32,
            width: width as f32,
            height: height as f32,
        },
        confidence: confidence as f32,
    }
}

/// What a D-Bus error name from the engine means for the pipeline.
#[derive(Debug, PartialEq, Eq)]
enum EngineFault {
    NotFound,
    AlreadyExists,
    Other,
}

/// Classify by the last segment of the error name, e.g.
/// `org.freedesktop.Biometric1.Error.ResourceNotFound`.
fn classify(error_name: &str) -> EngineFault {
    match error_name.rsplit('.').next().unwrap_or(error_name) {
        "ResourceNotFound" | "NotFound" | "UnknownObject" => EngineFault::NotFound,
        "ResourceAlreadyExists" | "AlreadyExists" | "FileExists" => EngineFault::AlreadyExists,
        _ => EngineFault::Other,
    }
}

fn engine_fault(operation: &'static str, kind: ResourceKind, name: &str, err: zbus::Error) -> Error {
    if let zbus::Error::MethodError(error_name, _, _) = &err {
        match classify(error_name.as_str()) {
            EngineFault::NotFound => {
                return Error::StoreNotFound {
                    kind,
                    name: name.to_string(),
                }
            }
            EngineFault::AlreadyExists => {
                return Error::AlreadyExists {
                    kind,
                    name: name.to_string(),
                }
            }
            EngineFault::Other => {}
        }
    }
    tracing::warn!(operation, error = %err, "biometric engine call failed");
    Error::provider(Service::Engine, operation, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_engine_error_names() {
        assert_eq!(
            classify("org.freedesktop.Biometric1.Error.ResourceNotFound"),
            EngineFault::NotFound
        );
        assert_eq!(
            classify("org.freedesktop.Biometric1.Error.ResourceAlreadyExists"),
            EngineFault::AlreadyExists
        );
        assert_eq!(classify("org.freedesktop.DBus.Error.FileExists"), EngineFault::AlreadyExists);
        assert_eq!(
            classify("org.freedesktop.Biometric1.Error.ProvisionedThroughputExceeded"),
            EngineFault::Other
        );
        assert_eq!(classify("NotFound"), EngineFault::NotFound);
    }

    #[test]
    fn test_non_method_errors_are_provider_faults() {
        let err = engine_fault(
            "IndexFaces",
            ResourceKind::Collection,
            "faces",
            zbus::Error::Failure("bus closed".into()),
        );
        assert!(matches!(
            err,
            Error::Provider {
                service: Service::Engine,
                operation: "IndexFaces",
                ..
            }
        ));
    }

    #[test]
    fn test_face_from_wire() {
        let face = face_from_wire((0.25, 0.5, 0.125, 0.2, 99.5));
        assert_eq!(face.bounding_box.left, 0.25);
        assert_eq!(face.bounding_box.width, 0.125);
        assert_eq!(face.confidence, 99.5);
    }

    #[test]
    #[ignore = "needs an environment with no reachable session bus"]
    fn test_connect_fails_without_bus() {
        let settings = EngineSettings {
            service: "org.freedesktop.Biometric1".into(),
            path: "/org/freedesktop/Biometric1".into(),
            timeout_secs: 1,
            session_bus: true,
        };
        assert!(matches!(
            DbusBiometricEngine::connect(&settings),
            Err(BackendError::EngineConnect { .. })
        ));
    }
}
