use thiserror::Error;

/// Admission failures produced by the visibility checks.
///
/// `NotFound` is returned to callers that cannot see an object at all so that
/// its existence is not disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{resource} \"{name}\" not found")]
    NotFound { resource: String, name: String },
    #[error("{resource} \"{name}\": ownership is required for {verb} operation")]
    Forbidden {
        resource: String,
        name: String,
        verb: String,
    },
    #[error("{0}")]
    BadRequest(String),
}

pub type AccessResult<T> = Result<T, AccessError>;
