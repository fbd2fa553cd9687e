//! # Multikey
//!
//! Encoding and decoding of Ed25519 public keys in Multikey format: the
//! multicodec tag for Ed25519 followed by the raw key, wrapped in multibase
//! base58-btc.

use anyhow::{Result, anyhow, bail};
use multibase::Base;

// Multicodec tag for an Ed25519 public key.
const ED25519_CODEC: [u8; 2] = [0xed, 0x01];

/// Length of a raw Ed25519 public key.
pub const ED25519_KEY_LEN: usize = 32;

/// Encode a raw Ed25519 public key as a Multikey string.
#[must_use]
pub fn encode_multikey(key: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(ED25519_CODEC.len() + key.len());
    bytes.extend_from_slice(&ED25519_CODEC);
    bytes.extend_from_slice(key);
    multibase::encode(Base::Base58Btc, bytes)
}

/// Decode a Multikey string to a raw Ed25519 public key.
///
/// # Errors
///
/// Will fail if the string is not multibase base58-btc, the multicodec tag
/// is not Ed25519, or the key length is wrong.
pub fn decode_multikey(multikey: &str) -> Result<Vec<u8>> {
    let (base, bytes) = multibase::decode(multikey)?;
    if base != Base::Base58Btc {
        bail!("multikey must be base58-btc encoded");
    }
    let Some(key) = bytes.strip_prefix(&ED25519_CODEC[..]) else {
        bail!("multikey is not an Ed25519 key");
    };
    if key.len() != ED25519_KEY_LEN {
        bail!("Ed25519 key must be {ED25519_KEY_LEN} bytes, got {}", key.len());
    }
    Ok(key.to_vec())
}

/// Extract the Multikey from a verification method id.
///
/// Supports a `did:key` id (`did:key:z6Mk…` or `did:key:z6Mk…#z6Mk…`) and
/// any DID URL whose fragment is a Multikey (`did:webvh:…#z6Mk…`).
///
/// # Errors
///
/// Will fail if neither the fragment nor the `did:key` body is a Multikey.
pub fn multikey_from_method(verification_method: &str) -> Result<String> {
    if let Some((_, fragment)) = verification_method.split_once('#') {
        if fragment.starts_with('z') {
            return Ok(fragment.to_string());
        }
    }
    if let Some(id) = verification_method.strip_prefix("did:key:") {
        let key = id.split('#').next().unwrap_or(id);
        if key.starts_with('z') {
            return Ok(key.to_string());
        }
    }
    Err(anyhow!("no Multikey in verification method {verification_method}"))
}
