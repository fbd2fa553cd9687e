//! # Log Entry Verification
//!
//! Authorization of controller proofs against the effective update keys,
//! structural validation of the witness parameter, and the witness-quorum
//! check applied at the tip of a resolution.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::log::{LogEntry, Witness, WitnessEntry};
use crate::proof::{proof_multikey, verify_proof};
use crate::provider::Verifier;

/// Verify the controller proofs on a log entry: at least one proof must
/// verify under a key in the effective update key set.
///
/// # Errors
///
/// Will return an error if the entry has no proof or no proof verifies
/// under an authorized key.
pub async fn verify_proofs(
    entry: &LogEntry, update_keys: &[String], verifier: &impl Verifier,
    known_keys: Option<&HashMap<String, String>>,
) -> Result<()> {
    if entry.proof.is_empty() {
        return Err(Error::Unauthorized(format!("{}: log entry has no proof", entry.version_id)));
    }

    let mut last_failure = None;
    for proof in &entry.proof {
        let multikey = match proof_multikey(proof, known_keys) {
            Ok(multikey) => multikey,
            Err(e) => {
                last_failure = Some(e.to_string());
                continue;
            }
        };
        if !update_keys.contains(&multikey) {
            last_failure =
                Some(format!("{} is not an authorized update key", proof.verification_method));
            continue;
        }
        match verify_proof(entry, proof, verifier, known_keys).await {
            Ok(()) => return Ok(()),
            Err(e) => last_failure = Some(e.to_string()),
        }
    }

    Err(Error::Unauthorized(format!(
        "{}: no proof verifies under the effective update keys: {}",
        entry.version_id,
        last_failure.unwrap_or_default()
    )))
}

/// Validate the shape of a witness parameter.
///
/// # Errors
///
/// Will fail if the threshold is zero or unreachable, the witness list is
/// empty or contains duplicates, a witness id is not a DID, or a declared
/// weight is zero.
pub fn validate_witness(witness: &Witness) -> Result<()> {
    if witness.threshold == 0 {
        return Err(Error::InvalidInput("witness threshold must be greater than zero".to_string()));
    }
    if witness.witnesses.is_empty() {
        return Err(Error::InvalidInput("witness list must not be empty".to_string()));
    }
    let mut seen = HashSet::new();
    let mut total_weight = 0;
    for w in &witness.witnesses {
        let Some(id) = w.id.strip_prefix("did:") else {
            return Err(Error::InvalidInput(format!("witness id {} must be a DID", w.id)));
        };
        if !id.split_once(':').is_some_and(|(method, id)| !method.is_empty() && !id.is_empty()) {
            return Err(Error::InvalidInput(format!("witness id {} must be a DID", w.id)));
        }
        if !seen.insert(w.id.as_str()) {
            return Err(Error::InvalidInput(format!("duplicate witness id {}", w.id)));
        }
        if w.contribution() == 0 {
            return Err(Error::InvalidInput(format!(
                "witness {} weight must be greater than zero",
                w.id
            )));
        }
        total_weight += w.contribution();
    }
    if total_weight < witness.threshold {
        return Err(Error::InvalidInput(format!(
            "total witness weight {total_weight} cannot reach the threshold {}",
            witness.threshold
        )));
    }
    Ok(())
}

/// Verify witness approvals for a log entry against the witness
/// configuration in effect.
///
/// Proof-file entries whose `versionId` differs from the entry's are
/// ignored. An invalid proof, or a proof from a signer not in the declared
/// witness list, is omitted from the total rather than failing the check.
/// Each distinct witness contributes at most once.
///
/// # Errors
///
/// Will fail if the summed weight of verified witnesses is below the
/// threshold.
pub async fn verify_witness(
    entry: &LogEntry, witness: &Witness, proofs: &[WitnessEntry], verifier: &impl Verifier,
) -> Result<u64> {
    let mut verified = HashSet::new();
    let mut total_weight = 0;

    for witness_entry in proofs {
        if witness_entry.version_id != entry.version_id {
            continue;
        }
        for proof in &witness_entry.proof {
            let signer = proof.verification_method.split('#').next().unwrap_or_default();
            let Some(weight) = witness.witnesses.iter().find(|w| w.id == signer) else {
                continue;
            };
            if verified.contains(signer) {
                continue;
            }
            if verify_proof(entry, proof, verifier, None).await.is_ok() {
                verified.insert(signer.to_string());
                total_weight += weight.contribution();
            }
        }
    }

    if total_weight < witness.threshold {
        return Err(Error::WitnessQuorum(format!(
            "{}: witness weight {total_weight} is below the threshold {}",
            entry.version_id, witness.threshold
        )));
    }
    Ok(total_weight)
}

#[cfg(test)]
mod tests {
    use crate::log::WitnessWeight;

    use super::*;

    fn witness_config(threshold: u64, ids: &[(&str, Option<u64>)]) -> Witness {
        Witness {
            threshold,
            witnesses: ids
                .iter()
                .map(|(id, weight)| WitnessWeight {
                    id: (*id).to_string(),
                    weight: *weight,
                })
                .collect(),
        }
    }

    #[test]
    fn witness_shape() {
        let ok = witness_config(2, &[("did:key:z6MkA", None), ("did:key:z6MkB", Some(3))]);
        validate_witness(&ok).expect("should validate");

        let zero = witness_config(0, &[("did:key:z6MkA", None)]);
        assert!(matches!(validate_witness(&zero), Err(Error::InvalidInput(_))));

        let empty = witness_config(1, &[]);
        assert!(matches!(validate_witness(&empty), Err(Error::InvalidInput(_))));

        let unreachable = witness_config(5, &[("did:key:z6MkA", Some(1))]);
        assert!(matches!(validate_witness(&unreachable), Err(Error::InvalidInput(_))));

        let duplicate =
            witness_config(1, &[("did:key:z6MkA", None), ("did:key:z6MkA", None)]);
        assert!(matches!(validate_witness(&duplicate), Err(Error::InvalidInput(_))));

        let not_a_did = witness_config(1, &[("z6MkA", None)]);
        assert!(matches!(validate_witness(&not_a_did), Err(Error::InvalidInput(_))));
    }
}
