//! Key management for integration tests: an in-memory Ed25519 keyring with
//! a pre-generated next key for rotation scenarios, plus a verifier backed
//! by `ed25519-dalek`.

use anyhow::{Result, anyhow};
use didwebvh::key::encode_multikey;
use didwebvh::{Algorithm, Signature, Signer, Verifier};
use ed25519_dalek::{Signature as Ed25519Signature, Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

/// An in-memory signing key pair with a pre-generated successor.
#[derive(Clone, Debug)]
pub struct Keyring {
    signing: SigningKey,
    next: SigningKey,
}

impl Keyring {
    /// Generate a new keyring with a signing key and a next key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
            next: SigningKey::generate(&mut OsRng),
        }
    }

    /// The current verifying key as a Multikey string.
    #[must_use]
    pub fn multibase(&self) -> String {
        encode_multikey(self.signing.verifying_key().as_bytes())
    }

    /// The next verifying key as a Multikey string.
    #[must_use]
    pub fn next_multibase(&self) -> String {
        encode_multikey(self.next.verifying_key().as_bytes())
    }

    /// A `did:key` verification method id for the current key.
    #[must_use]
    pub fn did_key(&self) -> String {
        let multibase = self.multibase();
        format!("did:key:{multibase}#{multibase}")
    }

    /// Promote the next key to the signing key and generate a fresh next
    /// key.
    pub fn rotate(&mut self) {
        self.signing = std::mem::replace(&mut self.next, SigningKey::generate(&mut OsRng));
    }
}

impl Default for Keyring {
    fn default() -> Self {
        Self::new()
    }
}

impl Signer for Keyring {
    async fn try_sign(&self, msg: &[u8]) -> Result<Vec<u8>> {
        Ok(self.signing.sign(msg).to_bytes().to_vec())
    }

    async fn verifying_key(&self) -> Result<Vec<u8>> {
        Ok(self.signing.verifying_key().as_bytes().to_vec())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::EdDSA
    }
}

impl Signature for Keyring {
    async fn verification_method(&self) -> Result<String> {
        Ok(self.did_key())
    }
}

/// A [`Verifier`] backed by `ed25519-dalek`.
#[derive(Clone, Debug, Default)]
pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    async fn verify(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> Result<bool> {
        let key: [u8; 32] =
            public_key.try_into().map_err(|_| anyhow!("public key must be 32 bytes"))?;
        let verifying_key = VerifyingKey::from_bytes(&key)?;
        let signature = Ed25519Signature::from_slice(signature)?;
        Ok(verifying_key.verify_strict(message, &signature).is_ok())
    }
}
