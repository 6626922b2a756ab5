use likeness_core::{FaceDetail, FaceId, Matches, Pipeline, PortraitMatch, RepresentativeMatch};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Pipeline(#[from] likeness_core::Error),
    #[error("pipeline thread exited")]
    ChannelClosed,
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[source] std::io::Error),
}

type Reply<T> = oneshot::Sender<Result<T, likeness_core::Error>>;

/// Messages sent from D-Bus handlers to the pipeline thread.
enum PipelineRequest {
    Index {
        image: Vec<u8>,
        label: String,
        reply: Reply<usize>,
    },
    Match {
        image: Vec<u8>,
        reply: Reply<Matches>,
    },
    MatchWithImage {
        image: Vec<u8>,
        reply: Reply<RepresentativeMatch>,
    },
    MatchWithImages {
        image: Vec<u8>,
        reply: Reply<Vec<PortraitMatch>>,
    },
    DetectLabels {
        image: Vec<u8>,
        reply: Reply<BTreeMap<String, f32>>,
    },
    DetectFaces {
        image: Vec<u8>,
        reply: Reply<Vec<FaceDetail>>,
    },
    UploadPortrait {
        key: String,
        image: Vec<u8>,
        identity: String,
        reply: Reply<()>,
    },
    DeleteFaces {
        face_ids: Vec<FaceId>,
        reply: Reply<()>,
    },
    DeleteIdentity {
        face_id: FaceId,
        reply: Reply<()>,
    },
}

/// Clone-safe handle to the pipeline thread.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<PipelineRequest>,
}

impl PipelineHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> PipelineRequest,
    ) -> Result<T, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| WorkerError::ChannelClosed)??)
    }

    pub async fn index(&self, image: Vec<u8>, label: String) -> Result<usize, WorkerError> {
        self.call(|reply| PipelineRequest::Index {
            image,
            label,
            reply,
        })
        .await
    }

    pub async fn match_faces(&self, image: Vec<u8>) -> Result<Matches, WorkerError> {
        self.call(|reply| PipelineRequest::Match { image, reply }).await
    }

    pub async fn match_with_image(
        &self,
        image: Vec<u8>,
    ) -> Result<RepresentativeMatch, WorkerError> {
        self.call(|reply| PipelineRequest::MatchWithImage { image, reply })
            .await
    }

    pub async fn match_with_images(
        &self,
        image: Vec<u8>,
    ) -> Result<Vec<PortraitMatch>, WorkerError> {
        self.call(|reply| PipelineRequest::MatchWithImages { image, reply })
            .await
    }

    pub async fn detect_labels(
        &self,
        image: Vec<u8>,
    ) -> Result<BTreeMap<String, f32>, WorkerError> {
        self.call(|reply| PipelineRequest::DetectLabels { image, reply })
            .await
    }

    pub async fn detect_faces(&self, image: Vec<u8>) -> Result<Vec<FaceDetail>, WorkerError> {
        self.call(|reply| PipelineRequest::DetectFaces { image, reply })
            .await
    }

    pub async fn upload_portrait(
        &self,
        key: String,
        image: Vec<u8>,
        identity: String,
    ) -> Result<(), WorkerError> {
        self.call(|reply| PipelineRequest::UploadPortrait {
            key,
            image,
            identity,
            reply,
        })
        .await
    }

    pub async fn delete_faces(&self, face_ids: Vec<FaceId>) -> Result<(), WorkerError> {
        self.call(|reply| PipelineRequest::DeleteFaces { face_ids, reply })
            .await
    }

    pub async fn delete_identity(&self, face_id: FaceId) -> Result<(), WorkerError> {
        self.call(|reply| PipelineRequest::DeleteIdentity { face_id, reply })
            .await
    }
}

/// Run the pipeline on a dedicated OS thread.
///
/// Every backend call blocks, so requests are served one at a time off the
/// async runtime. The thread exits when the last handle is dropped.
pub fn spawn_pipeline(pipeline: Pipeline) -> Result<PipelineHandle, WorkerError> {
    let (tx, mut rx) = mpsc::channel::<PipelineRequest>(8);

    std::thread::Builder::new()
        .name("likeness-pipeline".into())
        .spawn(move || {
            tracing::info!(collection = %pipeline.config().collection, "pipeline thread started");
            while let Some(req) = rx.blocking_recv() {
                serve(&pipeline, req);
            }
            tracing::info!("pipeline thread exiting");
        })
        .map_err(WorkerError::Spawn)?;

    Ok(PipelineHandle { tx })
}

// A dropped reply receiver means the caller gave up; the result is discarded.
fn serve(pipeline: &Pipeline, req: PipelineRequest) {
    match req {
        PipelineRequest::Index {
            image,
            label,
            reply,
        } => {
            let _ = reply.send(pipeline.index(&image, &label));
        }
        PipelineRequest::Match { image, reply } => {
            let _ = reply.send(pipeline.match_faces(&image));
        }
        PipelineRequest::MatchWithImage { image, reply } => {
            let _ = reply.send(pipeline.match_with_image(&image));
        }
        PipelineRequest::MatchWithImages { image, reply } => {
            let _ = reply.send(pipeline.match_with_images(&image));
        }
        PipelineRequest::DetectLabels { image, reply } => {
            let _ = reply.send(pipeline.detect_labels(&image));
        }
        PipelineRequest::DetectFaces { image, reply } => {
            let _ = reply.send(pipeline.detect_faces(&image));
        }
        PipelineRequest::UploadPortrait {
            key,
            image,
            identity,
            reply,
        } => {
            let _ = reply.send(pipeline.upload_portrait(&key, &image, &identity));
        }
        PipelineRequest::DeleteFaces { face_ids, reply } => {
            let _ = reply.send(pipeline.delete_faces(&face_ids));
        }
        PipelineRequest::DeleteIdentity { face_id, reply } => {
            let _ = reply.send(pipeline.delete_identity(&face_id));
        }
    }
}
