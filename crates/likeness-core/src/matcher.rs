//! Identity resolution: search a collection with a query image and translate
//! the returned faces into human identities.

use crate::engine::BiometricEngine;
use crate::error::{Error, Result};
use crate::store::{IdentityStore, ObjectStore};
use crate::types::{
    CollisionPolicy, FaceId, IdentityMatch, Matches, PortraitMatch, RepresentativeMatch,
};
use std::sync::Arc;

/// Portraits strictly larger than this are taken as usable.
pub const REPRESENTATIVE_MIN_BYTES: usize = 10_000;

pub struct FaceMatcher {
    engine: Arc<dyn BiometricEngine>,
    identities: Arc<dyn IdentityStore>,
    objects: Arc<dyn ObjectStore>,
    collection: String,
    full_name_attribute: String,
    policy: CollisionPolicy,
}

impl FaceMatcher {
    pub fn new(
        engine: Arc<dyn BiometricEngine>,
        identities: Arc<dyn IdentityStore>,
        objects: Arc<dyn ObjectStore>,
        collection: impl Into<String>,
        full_name_attribute: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            identities,
            objects,
            collection: collection.into(),
            full_name_attribute: full_name_attribute.into(),
            policy: CollisionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve every face the engine finds for `image` to an identity.
    ///
    /// Candidates are processed in provider order. Candidates without an
    /// identity record are skipped; any other store fault aborts the match.
    pub fn match_faces(&self, image: &[u8]) -> Result<Matches> {
        let candidates = self
            .engine
            .search_faces_by_image(image, &self.collection)?;
        tracing::info!(
            candidates = candidates.len(),
            collection = %self.collection,
            "collection searched"
        );

        let mut matches = Matches::default();
        for candidate in candidates {
            let Some(identity) = self.resolve(&candidate.face_id)? else {
                continue;
            };
            matches.record(
                IdentityMatch {
                    identity,
                    confidence: candidate.confidence,
                    face_id: candidate.face_id,
                },
                self.policy,
            );
        }

        tracing::info!(identities = matches.len(), "candidates resolved");
        Ok(matches)
    }

    /// Resolve matches and pick one identity with a stored portrait.
    ///
    /// Portraits are fetched by face id in match order. The first portrait
    /// larger than [`REPRESENTATIVE_MIN_BYTES`] wins; if none is, the last
    /// fetched match is returned with whatever image it had.
    pub fn match_with_image(&self, image: &[u8]) -> Result<RepresentativeMatch> {
        let matches = self.match_faces(image)?;
        let mut chosen = RepresentativeMatch::default();

        for found in &matches {
            let portrait = self.objects.get(found.face_id.as_str())?;
            let usable = portrait
                .as_ref()
                .is_some_and(|bytes| bytes.len() > REPRESENTATIVE_MIN_BYTES);

            tracing::debug!(
                identity = %found.identity,
                face_id = %found.face_id,
                bytes = portrait.as_ref().map_or(0, Vec::len),
                usable,
                "portrait fetched"
            );

            chosen = RepresentativeMatch {
                identity: Some(found.identity.clone()),
                confidence: Some(found.confidence),
                image: portrait,
            };
            if usable {
                break;
            }
        }

        Ok(chosen)
    }

    /// Resolve matches and fetch the stored portrait of every one of them.
    pub fn match_with_images(&self, image: &[u8]) -> Result<Vec<PortraitMatch>> {
        self.match_faces(image)?
            .into_iter()
            .map(|found| {
                let image = self.objects.get(found.face_id.as_str())?;
                Ok(PortraitMatch {
                    identity: found.identity,
                    confidence: found.confidence,
                    face_id: found.face_id,
                    image,
                })
            })
            .collect()
    }

    fn resolve(&self, face_id: &FaceId) -> Result<Option<String>> {
        let attributes = match self.identities.get(face_id) {
            Ok(attributes) => attributes,
            Err(Error::RecordNotFound(_)) => {
                tracing::debug!(face_id = %face_id, "no identity record; candidate skipped");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let identity = attributes.get(&self.full_name_attribute).cloned();
        if identity.is_none() {
            tracing::warn!(
                face_id = %face_id,
                attribute = %self.full_name_attribute,
                "identity record has no name attribute; candidate skipped"
            );
        }
        Ok(identity)
    }
}
