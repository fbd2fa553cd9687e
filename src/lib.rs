//! # DID Web with Verifiable History
//!
//! The `did:webvh` method enhances `did:web` with a verifiable history: the
//! authoritative state of a DID is an append-only log of entries hosted at
//! a web origin, each entry hash-chained to its content and signed by keys
//! the previous entry authorized. The identifier embeds a self-certifying
//! identifier (SCID) derived from the genesis entry, so tampering with
//! history is detectable without trusting the host.
//!
//! This crate is the log protocol engine: it builds and seals log entries
//! (create, update, deactivate), replays logs into a DID document and
//! resolution metadata while enforcing every invariant, and signs and
//! verifies entries under the `eddsa-jcs-2022` Data Integrity cryptosuite.
//! Key material, signature primitives, and network I/O stay outside, behind
//! the traits in [`provider`].
//!
//! See: <https://identity.foundation/didwebvh/next/>

pub mod core;
pub mod create;
pub mod deactivate;
pub mod document;
mod error;
pub mod hash;
pub mod key;
pub mod log;
pub mod proof;
pub mod provider;
pub mod resolve;
pub mod update;
mod url;
pub mod verify;

pub use create::{CreateBuilder, CreateResult};
pub use deactivate::{DeactivateBuilder, DeactivateResult};
pub use document::{
    Document, DocumentBuilder, MethodType, Service, ServiceBuilder, VerificationMethod,
    VerificationMethodBuilder, VmKeyId,
};
pub use error::{Error, Result};
pub use log::{DidLog, LogEntry, Parameters, Witness, WitnessEntry, WitnessWeight, parse_jsonl, to_jsonl};
pub use proof::Proof;
pub use provider::{Algorithm, Fetcher, Signature, Signer, Verifier};
pub use resolve::{
    ProofChecks, Resolved, ResolutionMetadata, ResolutionOptions, resolve_did, resolve_log,
};
pub use update::{UpdateBuilder, UpdateResult};
pub use url::{Url, default_did};

/// Placeholder for the self-certifying identifier (SCID) in a DID URL.
///
/// Replaced by the derived SCID when the genesis log entry is built. The
/// token cannot occur inside a base58 string, so substitution is
/// unambiguous.
pub const SCID_PLACEHOLDER: &str = "{SCID}";

/// The method and specification version written to genesis parameters.
pub const METHOD_VERSION: &str = "did:webvh:1.0";

/// Candidate contexts to add to a DID document.
pub const BASE_CONTEXT: [&str; 2] =
    ["https://www.w3.org/ns/did/v1", "https://w3id.org/security/multikey/v1"];
