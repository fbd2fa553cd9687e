//! # Canonicalization and Hashing
//!
//! JCS (RFC 8785) canonicalization plus the SHA-256/multihash/multibase
//! encoding used for entry hashes, SCIDs, and pre-rotation key commitments.

use anyhow::{Result, bail};
use multibase::Base;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::SCID_PLACEHOLDER;
use crate::log::LogEntry;

// Multihash tag for a SHA-256 digest: code 0x12, length 0x20.
const SHA2_256_MULTIHASH: [u8; 2] = [0x12, 0x20];

/// Serialize a JSON value to its canonical (JCS) form.
///
/// Inputs that differ only in object key order or insignificant whitespace
/// produce byte-identical output.
///
/// # Errors
///
/// Will return an error if the value fails serialization.
pub fn canonicalize(value: &Value) -> Result<String> {
    Ok(serde_json_canonicalizer::to_string(value)?)
}

/// SHA-256 over the canonical form of a JSON value, encoded as a multihash
/// wrapped in multibase base58-btc.
///
/// # Errors
///
/// Will return an error if the value fails serialization.
pub fn hash_value(value: &Value) -> Result<String> {
    let data = canonicalize(value)?;
    let digest = Sha256::digest(data.as_bytes());
    Ok(encode_multihash(&digest))
}

/// Compute the hash of a log entry: the multihash of the entry with its
/// `versionId` and `proof` fields removed.
///
/// # Errors
///
/// Will return an error if the entry fails serialization.
pub fn entry_hash(entry: &LogEntry) -> Result<String> {
    hash_value(&hashable_value(entry)?)
}

/// Compute the hash of a log entry with every occurrence of the SCID put
/// back to the placeholder token. Used to derive and to verify the SCID of
/// a genesis entry.
///
/// # Errors
///
/// Will return an error if the entry fails serialization.
pub fn entry_hash_with_placeholder(entry: &LogEntry, scid: &str) -> Result<String> {
    let mut value = hashable_value(entry)?;
    substitute(&mut value, scid, SCID_PLACEHOLDER);
    hash_value(&value)
}

/// Derive the SCID from a placeholder-bearing genesis entry.
///
/// # Errors
///
/// Will return an error if the entry fails serialization.
pub fn derive_scid(entry: &LogEntry) -> Result<String> {
    entry_hash(entry)
}

/// Verify that a genesis entry's SCID is the hash of its placeholder-bearing
/// form. The comparison is constant-time.
///
/// # Errors
///
/// Will return an error if the entry fails serialization or the SCID does
/// not match.
pub fn verify_scid(entry: &LogEntry, scid: &str) -> Result<()> {
    let hash = entry_hash_with_placeholder(entry, scid)?;
    if !constant_time_eq(hash.as_bytes(), scid.as_bytes()) {
        bail!("SCID does not match the hash of the placeholder-bearing entry");
    }
    Ok(())
}

/// Hash a multibase-encoded public key for a pre-rotation commitment, using
/// the same multihash/multibase encoding as entry hashes.
#[must_use]
pub fn hash_key(multikey: &str) -> String {
    let digest = Sha256::digest(multikey.as_bytes());
    encode_multihash(&digest)
}

/// Wrap a SHA-256 digest in multihash framing and multibase base58-btc.
#[must_use]
pub fn encode_multihash(digest: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(SHA2_256_MULTIHASH.len() + digest.len());
    bytes.extend_from_slice(&SHA2_256_MULTIHASH);
    bytes.extend_from_slice(digest);
    multibase::encode(Base::Base58Btc, bytes)
}

/// Replace occurrences of `from` with `to` in every string value of a JSON
/// structure. Object keys are never mutated.
pub fn substitute(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) => {
            if s.contains(from) {
                *s = s.replace(from, to);
            }
        }
        Value::Array(items) => {
            for item in items {
                substitute(item, from, to);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute(item, from, to);
            }
        }
        _ => {}
    }
}

// The entry as a JSON object with the fields excluded from hashing removed.
fn hashable_value(entry: &LogEntry) -> Result<Value> {
    let mut value = serde_json::to_value(entry)?;
    let Some(object) = value.as_object_mut() else {
        bail!("log entry did not serialize to an object");
    };
    object.remove("versionId");
    object.remove("proof");
    Ok(value)
}

// Byte comparison without an early exit on mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
