use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute map persisted for one face in the identity store.
pub type Attributes = BTreeMap<String, String>;

/// User metadata attached to a stored object.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Opaque face identifier issued by the biometric engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceId(String);

impl FaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FaceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for FaceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A face returned by a collection search, before identity resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub face_id: FaceId,
    /// Provider-assigned similarity score (0-100).
    pub confidence: f32,
}

/// A candidate resolved to a human identity through the identity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    pub identity: String,
    pub confidence: f32,
    /// Face that supplied `confidence`; also the object store key of its portrait.
    pub face_id: FaceId,
}

/// How two candidates resolving to the same identity are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The later candidate replaces the earlier one.
    #[default]
    Overwrite,
    /// The candidate with the higher confidence is kept.
    KeepHighest,
}

impl std::str::FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "keep-highest" => Ok(Self::KeepHighest),
            other => Err(format!(
                "unknown collision policy '{other}' (expected 'overwrite' or 'keep-highest')"
            )),
        }
    }
}

/// Resolved matches keyed by identity, in first-insertion order.
///
/// Each identity appears once. Iteration order is the order in which an
/// identity was first resolved, which follows the engine's candidate order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Matches {
    entries: Vec<IdentityMatch>,
}

impl Matches {
    /// Record a resolved match, combining with an existing entry per `policy`.
    pub fn record(&mut self, found: IdentityMatch, policy: CollisionPolicy) {
        let existing = self
            .entries
            .iter_mut()
            .find(|e| e.identity == found.identity);

        match existing {
            None => self.entries.push(found),
            Some(entry) => match policy {
                CollisionPolicy::Overwrite => *entry = found,
                CollisionPolicy::KeepHighest => {
                    if found.confidence > entry.confidence {
                        *entry = found;
                    }
                }
            },
        }
    }

    /// Confidence recorded for `identity`, if it matched.
    pub fn confidence(&self, identity: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|e| e.identity == identity)
            .map(|e| e.confidence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IdentityMatch> {
        self.entries.iter()
    }

    /// Matches sorted by descending confidence.
    pub fn ranked(&self) -> Vec<&IdentityMatch> {
        let mut ranked: Vec<&IdentityMatch> = self.entries.iter().collect();
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    /// `(identity, confidence)` pairs in iteration order.
    pub fn to_pairs(&self) -> Vec<(String, f32)> {
        self.entries
            .iter()
            .map(|e| (e.identity.clone(), e.confidence))
            .collect()
    }
}

impl IntoIterator for Matches {
    type Item = IdentityMatch;
    type IntoIter = std::vec::IntoIter<IdentityMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Matches {
    type Item = &'a IdentityMatch;
    type IntoIter = std::slice::Iter<'a, IdentityMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Single identity chosen together with a stored portrait.
///
/// All fields are `None` when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepresentativeMatch {
    pub identity: Option<String>,
    pub confidence: Option<f32>,
    pub image: Option<Vec<u8>>,
}

impl RepresentativeMatch {
    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
    }
}

/// One matched identity together with whatever portrait the object store held for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortraitMatch {
    pub identity: String,
    pub confidence: f32,
    pub face_id: FaceId,
    pub image: Option<Vec<u8>>,
}

/// Generic label detected in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f32,
}

/// Face bounding box in image-relative coordinates (0.0-1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// A face located by the engine without indexing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetail {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

/// Backing table of the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    /// Attribute holding the face identifier.
    pub key_attribute: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(identity: &str, confidence: f32, face: &str) -> IdentityMatch {
        IdentityMatch {
            identity: identity.into(),
            confidence,
            face_id: face.into(),
        }
    }

    #[test]
    fn test_overwrite_replaces_earlier_entry() {
        let mut matches = Matches::default();
        matches.record(found("ada", 99.0, "f1"), CollisionPolicy::Overwrite);
        matches.record(found("ada", 80.0, "f2"), CollisionPolicy::Overwrite);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches.confidence("ada"), Some(80.0));
        assert_eq!(matches.iter().next().map(|m| m.face_id.as_str()), Some("f2"));
    }

    #[test]
    fn test_keep_highest_ignores_weaker_entry() {
        let mut matches = Matches::default();
        matches.record(found("ada", 99.0, "f1"), CollisionPolicy::KeepHighest);
        matches.record(found("ada", 80.0, "f2"), CollisionPolicy::KeepHighest);

        assert_eq!(matches.confidence("ada"), Some(99.0));
        assert_eq!(matches.iter().next().map(|m| m.face_id.as_str()), Some("f1"));
    }

    #[test]
    fn test_iteration_keeps_first_insertion_position() {
        let mut matches = Matches::default();
        matches.record(found("ada", 90.0, "f1"), CollisionPolicy::Overwrite);
        matches.record(found("grace", 95.0, "f2"), CollisionPolicy::Overwrite);
        matches.record(found("ada", 70.0, "f3"), CollisionPolicy::Overwrite);

        let names: Vec<_> = matches.iter().map(|m| m.identity.as_str()).collect();
        assert_eq!(names, ["ada", "grace"]);
    }

    #[test]
    fn test_ranked_sorts_by_confidence() {
        let mut matches = Matches::default();
        matches.record(found("ada", 70.0, "f1"), CollisionPolicy::Overwrite);
        matches.record(found("grace", 95.0, "f2"), CollisionPolicy::Overwrite);

        let ranked: Vec<_> = matches.ranked().iter().map(|m| m.identity.as_str()).collect();
        assert_eq!(ranked, ["grace", "ada"]);
    }

    #[test]
    fn test_collision_policy_from_str() {
        assert_eq!("overwrite".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Overwrite));
        assert_eq!("keep-highest".parse::<CollisionPolicy>(), Ok(CollisionPolicy::KeepHighest));
        assert!("max".parse::<CollisionPolicy>().is_err());
    }
}
