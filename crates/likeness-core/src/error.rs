use crate::types::FaceId;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// External capability that produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Engine,
    IdentityStore,
    ObjectStore,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::Engine => "biometric engine",
            Service::IdentityStore => "identity store",
            Service::ObjectStore => "object store",
        })
    }
}

/// Kind of named resource referenced by a lookup or lifecycle fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Collection,
    Table,
    Object,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Collection => "face collection",
            ResourceKind::Table => "identity table",
            ResourceKind::Object => "object",
        })
    }
}

/// Coarse classification of an [`Error`], stable across wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputIo,
    Provider,
    StoreNotFound,
    RecordNotFound,
    AlreadyExists,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read image {path}: {source}")]
    InputIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{service} rejected {operation}: {message}")]
    Provider {
        service: Service,
        operation: &'static str,
        message: String,
    },

    #[error("{kind} not found: {name}")]
    StoreNotFound { kind: ResourceKind, name: String },

    #[error("no identity record for face {0}")]
    RecordNotFound(FaceId),

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// Faces were indexed by the engine but not every identity record was written.
    /// The indexed faces stay in the collection without a name.
    #[error("indexed {indexed} faces but recorded only {recorded}: {source}")]
    PartialIndex {
        indexed: usize,
        recorded: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn provider(service: Service, operation: &'static str, message: impl Into<String>) -> Self {
        Error::Provider {
            service,
            operation,
            message: message.into(),
        }
    }

    /// Kind of the originating fault. Partial indexing reports the kind of the
    /// write that interrupted it.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputIo { .. } => ErrorKind::InputIo,
            Error::Provider { .. } => ErrorKind::Provider,
            Error::StoreNotFound { .. } => ErrorKind::StoreNotFound,
            Error::RecordNotFound(_) => ErrorKind::RecordNotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::PartialIndex { source, .. } => source.kind(),
        }
    }
}
