use thiserror::Error;

/// A bearer token whose claims could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),
}

/// The OS random number generator could not produce a node id.
#[derive(Debug, Error)]
#[error("failed to generate node id: {0}")]
pub struct NodeIdError(pub String);
