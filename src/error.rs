//! Error types for `did:webvh` operations.

use thiserror::Error;

/// Returns `did:webvh`-specific errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, replaying, or resolving a DID log.
///
/// Every variant produced during replay carries a human-readable message
/// naming the offending `versionId` where one exists.
#[derive(Error, Debug)]
pub enum Error {
    /// A required field is missing or an input has an unexpected shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A log entry failed version-number, entry-hash, SCID, or timestamp
    /// validation.
    #[error("chain integrity: {0}")]
    ChainIntegrity(String),

    /// No proof verified under the effective update keys, or a key rotation
    /// broke a pre-rotation commitment.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation is not permitted by the current parameters, such as
    /// updating a deactivated DID or moving a non-portable DID.
    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    /// Witness approvals at the log tip fell below the declared threshold.
    #[error("witness quorum not met: {0}")]
    WitnessQuorum(String),

    /// A requested version does not exist in the log.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// An entry or document could not be serialized or deserialized.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An external collaborator (signer, verifier, or fetcher) failed.
    #[error(transparent)]
    External(#[from] anyhow::Error),
}
