//! # Data Integrity Proofs
//!
//! Construction and verification of `eddsa-jcs-2022` proofs over log
//! entries. The signing input is `sha256(canon(proof options)) ||
//! sha256(canon(document))` where the document is the entry without its
//! `proof` field and the proof options are the proof without `proofValue`.
//!
//! [W3C Data Integrity](https://www.w3.org/TR/vc-data-integrity/)

use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use multibase::Base;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::hash::canonicalize;
use crate::key::{decode_multikey, multikey_from_method};
use crate::log::LogEntry;
use crate::provider::{Algorithm, Signature, Verifier};

/// The proof type produced and accepted by this crate.
pub const PROOF_TYPE: &str = "DataIntegrityProof";

/// The cryptosuite produced and accepted by this crate.
pub const CRYPTOSUITE: &str = "eddsa-jcs-2022";

/// An embedded Data Integrity proof.
///
/// The `proof_value` field is computed over a configuration object with the
/// same shape as the proof but without `proofValue`, so the field is
/// optional on this struct.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// An optional identifier for the proof, a URL such as a UUID URN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The proof type. Must be `DataIntegrityProof`.
    #[serde(rename = "type")]
    pub type_: String,

    /// The cryptographic suite used to create the proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cryptosuite: Option<String>,

    /// The reason for the proof, acting as a safeguard against misuse.
    pub proof_purpose: String,

    /// A reference to the key material used to verify the proof.
    pub verification_method: String,

    /// The date-time the proof was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Used to mitigate replay attacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    /// The proof signature, multibase-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
}

/// Construct a data integrity proof over a log entry.
///
/// # Errors
///
/// Will return an error if the signer algorithm is not `EdDSA`, the entry
/// or proof options cannot be serialized, or the signer fails.
pub async fn create_proof(entry: &LogEntry, signer: &impl Signature) -> Result<Proof> {
    if signer.algorithm() != Algorithm::EdDSA {
        bail!("signing algorithm must be Ed25519 (pure EdDSA)");
    }
    let verification_method = signer.verification_method().await?;

    let config = Proof {
        id: Some(format!("urn:uuid:{}", Uuid::new_v4())),
        type_: PROOF_TYPE.to_string(),
        cryptosuite: Some(CRYPTOSUITE.to_string()),
        proof_purpose: "assertionMethod".to_string(),
        verification_method,
        created: Some(Utc::now()),
        challenge: None,
        proof_value: None,
    };

    let payload = signing_input(&document_value(entry)?, &config)?;
    let signature = signer.try_sign(&payload).await?;
    let value = multibase::encode(Base::Base58Btc, signature);

    let mut proof = config;
    proof.proof_value = Some(value);
    Ok(proof)
}

/// Verify a single data integrity proof over a log entry.
///
/// The public key is recovered from the proof's `verificationMethod`: a
/// Multikey embedded in the method id, or a lookup in the caller-supplied
/// key set mapping method ids to Multikey strings.
///
/// # Errors
///
/// Will return an error if the proof is malformed, the key cannot be
/// recovered, or the signature does not verify.
pub async fn verify_proof(
    entry: &LogEntry, proof: &Proof, verifier: &impl Verifier,
    known_keys: Option<&HashMap<String, String>>,
) -> Result<()> {
    check_options(proof)?;
    let Some(proof_value) = &proof.proof_value else {
        bail!("proof value is missing");
    };
    let (_, signature) = multibase::decode(proof_value)?;

    let mut config = proof.clone();
    config.proof_value = None;
    let payload = signing_input(&document_value(entry)?, &config)?;

    let multikey = proof_multikey(proof, known_keys)?;
    let public_key = decode_multikey(&multikey)?;

    if !verifier.verify(&signature, &payload, &public_key).await? {
        bail!("signature verification failed for {}", proof.verification_method);
    }
    Ok(())
}

/// The Multikey named by a proof's `verificationMethod`, consulting the
/// caller-supplied key set when the method id does not embed one.
///
/// # Errors
///
/// Will return an error if no key can be recovered.
pub fn proof_multikey(
    proof: &Proof, known_keys: Option<&HashMap<String, String>>,
) -> Result<String> {
    multikey_from_method(&proof.verification_method).or_else(|e| {
        known_keys
            .and_then(|keys| keys.get(&proof.verification_method).cloned())
            .ok_or_else(|| anyhow!("{e}: no caller-supplied key for the method"))
    })
}

// Structural checks on the proof configuration.
fn check_options(proof: &Proof) -> Result<()> {
    if proof.type_ != PROOF_TYPE {
        bail!("unsupported proof type {} - must be '{PROOF_TYPE}'", proof.type_);
    }
    if proof.cryptosuite.as_deref() != Some(CRYPTOSUITE) {
        bail!(
            "unsupported cryptosuite {} - must be '{CRYPTOSUITE}'",
            proof.cryptosuite.as_deref().unwrap_or("")
        );
    }
    if proof.proof_purpose != "authentication" && proof.proof_purpose != "assertionMethod" {
        bail!(
            "unsupported proof purpose {} - must be 'authentication' or 'assertionMethod'",
            proof.proof_purpose
        );
    }
    Ok(())
}

// The entry as the proof's document: a JSON object without the proof field.
fn document_value(entry: &LogEntry) -> Result<Value> {
    let mut value = serde_json::to_value(entry)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("proof");
    }
    Ok(value)
}

// Hash the proof options and the document separately and concatenate.
fn signing_input(document: &Value, options: &Proof) -> Result<Vec<u8>> {
    let options_data = canonicalize(&serde_json::to_value(options)?)?;
    let options_hash = Sha256::digest(options_data.as_bytes());

    let document_data = canonicalize(document)?;
    let document_hash = Sha256::digest(document_data.as_bytes());

    Ok([options_hash.as_slice(), document_hash.as_slice()].concat())
}
