//! # Provider Traits
//!
//! The engine is a pure computation over in-memory data; everything with an
//! external effect is reached through the traits in this module. An
//! operation suspends in exactly three places: signing, signature
//! verification, and fetching (log or witness-proof documents).

use std::future::Future;

use anyhow::Result;

/// Signing algorithms accepted by the proof engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Algorithm {
    /// Ed25519 (pure EdDSA), as required by `eddsa-jcs-2022`.
    #[default]
    EdDSA,
}

/// [`Signer`] is implemented by holders of signing key material. The engine
/// hands over fully prepared bytes; the implementer only signs.
pub trait Signer: Send + Sync {
    /// Sign the message and return the raw signature bytes.
    fn try_sign(&self, msg: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// The raw public key corresponding to the signing key.
    fn verifying_key(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// The signing algorithm in use.
    fn algorithm(&self) -> Algorithm;
}

/// [`Signature`] extends [`Signer`] with the verification method a verifier
/// should use to check the signer's signatures.
pub trait Signature: Signer {
    /// The verification method id, typically a DID URL + `#` + key id.
    ///
    /// Async and fallible because the implementer may need to access key
    /// information to construct the method reference.
    fn verification_method(&self) -> impl Future<Output = Result<String>> + Send;
}

/// [`Verifier`] checks a raw signature over a message with a raw public
/// key. The engine decodes keys and reconstructs signing input itself; the
/// implementer only answers whether the signature is valid.
pub trait Verifier: Send + Sync {
    /// Returns `Ok(true)` when the signature verifies, `Ok(false)` when it
    /// does not, and an error only when verification could not be carried
    /// out at all.
    fn verify(
        &self, signature: &[u8], message: &[u8], public_key: &[u8],
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// [`Fetcher`] is used to proxy retrieval of a web-hosted document, such as
/// a `did.jsonl` log or a `did-witness.json` proof file.
///
/// Implementers may dereference the URL directly, consult a local cache, or
/// forward to a remote resolver.
pub trait Fetcher: Send + Sync {
    /// Fetch the document at the URL and return its raw bytes.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}
