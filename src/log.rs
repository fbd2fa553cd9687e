//! # DID Log
//!
//! The `did.jsonl` log model: entries, the parameter deltas they carry, the
//! witness configuration, and the newline-delimited JSON codec.
//!
//! <https://identity.foundation/didwebvh/#the-did-log-file>

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Error;
use crate::proof::Proof;
use crate::provider::Signature;
use crate::{hash, proof};

/// A `DidLog` is the ordered set of log entries for a DID.
pub type DidLog = Vec<LogEntry>;

/// `LogEntry` is an entry in the `did.jsonl` log file denoting one version
/// of a DID document.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// DID version number starting at 1 and incrementing by one per
    /// version, a literal dash `-`, and the entry hash.
    pub version_id: String,

    /// A UTC timestamp in RFC 3339 format. Non-decreasing along the log.
    pub version_time: DateTime<Utc>,

    /// Protocol parameter delta for this version.
    pub parameters: Parameters,

    /// The DID document for this version.
    pub state: Document,

    /// Data integrity proofs over the entry.
    ///
    /// Required on a final log entry but omitted while hashing, so it is
    /// skippable here to support the build algorithm.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub proof: Vec<Proof>,
}

impl LogEntry {
    /// The hash of the log entry: the multihash of the entry with its
    /// `versionId` and `proof` removed.
    ///
    /// # Errors
    ///
    /// Will return an error if the entry fails serialization.
    pub fn hash(&self) -> Result<String> {
        hash::entry_hash(self)
    }

    /// The 1-based version number parsed from the entry's `versionId`.
    ///
    /// # Errors
    ///
    /// Will return an error if the version id is not of the form
    /// `<n>-<entryHash>`.
    pub fn version_number(&self) -> Result<u64> {
        let Some((number, hash)) = self.version_id.split_once('-') else {
            anyhow::bail!("version id {} has an unexpected format", self.version_id);
        };
        if hash.is_empty() {
            anyhow::bail!("version id {} has an empty entry hash", self.version_id);
        }
        Ok(number.parse::<u64>()?)
    }

    /// Construct a controller's data integrity proof and add it to the log
    /// entry.
    ///
    /// # Errors
    ///
    /// Will return an error if the signer algorithm is not `EdDSA` or if
    /// the proof structure cannot be serialized.
    pub async fn sign(&mut self, signer: &impl Signature) -> Result<()> {
        let proof = self.proof(signer).await?;
        self.proof.push(proof);
        Ok(())
    }

    /// Construct a proof over this log entry without attaching it.
    ///
    /// This can be used for a controller's proof or a witness's proof. The
    /// signing input is independent of any proofs already attached, so a
    /// witness may co-sign before or after the controller. For a
    /// controller's proof, prefer [`LogEntry::sign`].
    ///
    /// # Errors
    ///
    /// Will return an error if the signer algorithm is not `EdDSA` or if
    /// the proof structure cannot be serialized.
    pub async fn proof(&self, signer: &impl Signature) -> Result<Proof> {
        proof::create_proof(self, signer).await
    }
}

/// Parameters carried by a log entry.
///
/// Every field is optional: an absent field means the value from the
/// previous entry carries forward, a present field re-sets it. The genesis
/// entry must set `method`, `scid`, and `updateKeys`.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    /// The `did:webvh` specification version to use when processing the
    /// log, e.g. `did:webvh:1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// The self-certifying identifier for this DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scid: Option<String>,

    /// Multikey-format public keys whose private counterparts are
    /// authorized to sign the next log entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_keys: Option<Vec<String>>,

    /// Hashes of public keys that may become `updateKeys` in the next key
    /// rotation (pre-rotation commitment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key_hashes: Option<Vec<String>>,

    /// Whether the DID may be renamed and hosted on a different domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portable: Option<bool>,

    /// Witnesses for the DID and the threshold their approvals must reach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,

    /// URIs of watchers that track this DID. Advisory; not validated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchers: Option<Vec<String>>,

    /// Set to true when the DID has been deactivated. Once true, no further
    /// entries are admissible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,

    /// Maximum time in seconds the DID should be cached before a full
    /// resolution must be performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,

    /// Legacy flat witness list. Accepted on read and folded into `witness`
    /// by [`Parameters::effective_witness`]; never written back.
    #[serde(default, rename = "witnesses", skip_serializing)]
    pub legacy_witnesses: Option<Vec<WitnessWeight>>,
}

impl Parameters {
    /// The witness configuration in effect for this entry, folding the
    /// legacy flat `witnesses` list into the object form (the flat list
    /// carries no threshold, so unanimity is assumed).
    #[must_use]
    pub fn effective_witness(&self) -> Option<Witness> {
        if self.witness.is_some() {
            return self.witness.clone();
        }
        self.legacy_witnesses.as_ref().filter(|list| !list.is_empty()).map(|list| Witness {
            threshold: list.len() as u64,
            witnesses: list.clone(),
        })
    }
}

/// A list of witnesses and the threshold their weighted approvals must meet
/// for a change to the DID to be accepted.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Witness {
    /// The total of witness weights required to approve a change.
    pub threshold: u64,

    /// The witnesses and their contributing weights.
    pub witnesses: Vec<WitnessWeight>,
}

/// The weight a witness contributes to the approval of a DID update.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WitnessWeight {
    /// The DID of the witness.
    pub id: String,

    /// The weight of the witness. Defaults to 1 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
}

impl WitnessWeight {
    /// The weight this witness contributes.
    #[must_use]
    pub const fn contribution(&self) -> u64 {
        match self.weight {
            Some(weight) => weight,
            None => 1,
        }
    }
}

/// Entry in the `did-witness.json` file.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WitnessEntry {
    /// Version id of the log entry to which the witnesses' proofs apply.
    pub version_id: String,

    /// Witnesses' proofs over the log entry.
    pub proof: Vec<Proof>,
}

/// Parse the contents of a `did.jsonl` file into log entries.
///
/// One entry per line, each line parsed independently. A trailing newline
/// is tolerated; blank interior lines are not.
///
/// # Errors
///
/// Will return an error if any line is blank or fails to parse.
pub fn parse_jsonl(text: &str) -> crate::Result<Vec<LogEntry>> {
    let lines = text.split('\n').collect::<Vec<&str>>();
    let last = lines.len().saturating_sub(1);
    let mut entries = vec![];
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if i == last {
                continue;
            }
            return Err(Error::InvalidInput(format!("log line {} is blank", i + 1)));
        }
        let entry = serde_json::from_str::<LogEntry>(line)?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Serialize log entries to `did.jsonl` format, one entry per line with a
/// trailing newline.
///
/// # Errors
///
/// Will return an error if an entry fails serialization.
pub fn to_jsonl(entries: &[LogEntry]) -> crate::Result<String> {
    let mut text = String::new();
    for entry in entries {
        text.push_str(&serde_json::to_string(entry)?);
        text.push('\n');
    }
    Ok(text)
}
