//! likeness-core: identity resolution over an external biometric engine.
//!
//! Binds faces detected by the engine to human identities held in a
//! key-value identity store, resolves query images back to those
//! identities, and recovers representative portraits from an object store.

pub mod admin;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod labels;
pub mod matcher;
pub mod pipeline;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use engine::BiometricEngine;
pub use error::{Error, ErrorKind, ResourceKind, Result, Service};
pub use pipeline::{Pipeline, PipelineConfig};
pub use store::{IdentityStore, ObjectStore, TableCatalog};
pub use types::{
    Attributes, BoundingBox, CollisionPolicy, FaceDetail, FaceId, IdentityMatch, Label,
    MatchCandidate, Matches, ObjectMetadata, PortraitMatch, RepresentativeMatch, TableSpec,
};
