//! # Resolution
//!
//! Replay of a DID log: every entry is validated in order while a metadata
//! accumulator advances, producing the DID document and resolution metadata
//! as of a requested target version or the tip.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Kind, OneMany};
use crate::document::{Document, Service};
use crate::error::{Error, Result};
use crate::log::{LogEntry, Witness, WitnessEntry, parse_jsonl};
use crate::provider::{Fetcher, Verifier};
use crate::url::Url;
use crate::{hash, verify};

// Number of entries at the tip that keep full proof verification when
// fast resolution is enabled.
const FAST_VERIFY_WINDOW: usize = 10;

/// How much cryptographic proof checking to perform during replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProofChecks {
    /// Verify proofs on every entry.
    #[default]
    Full,

    /// Verify proofs on the genesis entry and the most recent entries
    /// only. Hash-chain and parameter checks still run for every entry.
    ///
    /// This weakens the security model for interior entries and must be
    /// opted into.
    Fast,
}

/// Options refining the resolution of a log.
#[derive(Clone, Debug, Default)]
pub struct ResolutionOptions {
    /// Resolve the version with this `versionId`.
    pub version_id: Option<String>,

    /// Resolve the version with this 1-based version number.
    pub version_number: Option<u64>,

    /// Resolve the version that was current at this time.
    pub version_time: Option<DateTime<Utc>>,

    /// Resolve the first version in which this verification method appears.
    pub verification_method: Option<String>,

    /// Public keys for proof verification methods that do not embed their
    /// key, mapping verification method id to Multikey.
    pub verification_keys: Option<HashMap<String, String>>,

    /// Proof verification coverage.
    pub proof_checks: ProofChecks,
}

impl ResolutionOptions {
    fn has_target(&self) -> bool {
        self.version_id.is_some()
            || self.version_number.is_some()
            || self.version_time.is_some()
            || self.verification_method.is_some()
    }

    fn describe_target(&self) -> String {
        if let Some(version_id) = &self.version_id {
            return format!("versionId {version_id}");
        }
        if let Some(number) = self.version_number {
            return format!("version number {number}");
        }
        if let Some(time) = self.version_time {
            return format!("versionTime {time}");
        }
        if let Some(vm) = &self.verification_method {
            return format!("verification method {vm}");
        }
        "tip".to_string()
    }
}

/// Resolution metadata accumulated by replaying a log.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionMetadata {
    /// Version id of the resolved entry.
    pub version_id: String,

    /// Timestamp of the genesis entry.
    pub created: DateTime<Utc>,

    /// Timestamp of the resolved entry.
    pub updated: DateTime<Utc>,

    /// The self-certifying identifier bound to the log.
    pub scid: String,

    /// Keys authorized to sign the next log entry.
    pub update_keys: Vec<String>,

    /// Outstanding pre-rotation commitment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key_hashes: Option<Vec<String>>,

    /// Whether a pre-rotation commitment is in force.
    pub prerotation: bool,

    /// Whether the DID may move to a different host.
    pub portable: bool,

    /// Whether the DID has been deactivated.
    pub deactivated: bool,

    /// Witness configuration in effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,

    /// Watchers tracking the DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchers: Option<Vec<String>>,
}

/// Outcome of a resolution: the DID, its document, and the metadata
/// accumulated up to the resolved version.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Resolved {
    /// The resolved DID.
    pub did: String,

    /// The DID document as of the resolved version, with default services
    /// injected.
    pub document: Document,

    /// Resolution metadata as of the resolved version.
    pub metadata: ResolutionMetadata,
}

/// Verify a DID log and resolve it into a DID document and metadata.
///
/// Witness proofs are checked at the tip when supplied; pass `None` to skip
/// the quorum check (for example when re-validating a log that is about to
/// be extended).
///
/// If replay fails after the requested target version was already captured,
/// the captured snapshot is returned and the failure logged: a broken tip
/// does not prevent best-effort resolution of an intact prior version.
///
/// # Errors
///
/// Will fail if any entry violates a log invariant, a requested target does
/// not exist, or the witness quorum is not met.
pub async fn resolve_log(
    log: &[LogEntry], witness_proofs: Option<&[WitnessEntry]>,
    options: Option<ResolutionOptions>, verifier: &impl Verifier,
) -> Result<Resolved> {
    let options = options.unwrap_or_default();
    let mut captured = None;
    match replay(log, witness_proofs, &options, verifier, &mut captured).await {
        Ok(resolved) => Ok(resolved),
        Err(e) => {
            if let Some(snapshot) = captured {
                tracing::warn!(
                    "returning {} after replay failure: {e}",
                    snapshot.metadata.version_id
                );
                Ok(snapshot)
            } else {
                Err(e)
            }
        }
    }
}

/// Resolve a `did:webvh` DID by fetching its log (and witness proofs when a
/// witness threshold is in force) and replaying it.
///
/// # Errors
///
/// Will fail if the DID is malformed, a fetch fails, or the log does not
/// resolve.
pub async fn resolve_did(
    did: &str, fetcher: &impl Fetcher, verifier: &impl Verifier,
    options: Option<ResolutionOptions>,
) -> Result<Resolved> {
    let url = did.parse::<Url>()?;

    let bytes = fetcher.fetch(&url.http_url()).await?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::InvalidInput(format!("log document is not UTF-8: {e}")))?;
    let log = parse_jsonl(&text)?;

    // The witness configuration is sticky: the most recent entry to set it
    // determines whether proofs are required at the tip.
    let witnessed = log
        .iter()
        .rev()
        .find_map(|entry| entry.parameters.effective_witness())
        .is_some_and(|witness| witness.threshold > 0);
    let witness_proofs = if witnessed {
        let bytes = fetcher.fetch(&url.witness_url()).await?;
        Some(serde_json::from_slice::<Vec<WitnessEntry>>(&bytes)?)
    } else {
        None
    };

    let resolved = resolve_log(&log, witness_proofs.as_deref(), options, verifier).await?;
    if resolved.metadata.scid != url.scid {
        return Err(Error::ChainIntegrity(format!(
            "SCID {} in the DID does not match the log SCID {}",
            url.scid, resolved.metadata.scid
        )));
    }
    Ok(resolved)
}

// Walk the log in order, enforcing every invariant and capturing the target
// snapshot as soon as it is reached.
#[allow(clippy::too_many_lines)]
async fn replay(
    log: &[LogEntry], witness_proofs: Option<&[WitnessEntry]>, options: &ResolutionOptions,
    verifier: &impl Verifier, captured: &mut Option<Resolved>,
) -> Result<Resolved> {
    if log.is_empty() {
        return Err(Error::InvalidInput("log contains no entries".to_string()));
    }
    let has_target = options.has_target();
    let fast_floor = match options.proof_checks {
        ProofChecks::Fast => log.len().saturating_sub(FAST_VERIFY_WINDOW),
        ProofChecks::Full => 0,
    };

    let mut meta = ResolutionMetadata::default();
    let mut effective_keys: Vec<String> = vec![];
    let mut committed_hashes: Option<Vec<String>> = None;
    let mut prev_time: Option<DateTime<Utc>> = None;
    let mut genesis_segment = String::new();

    for (i, entry) in log.iter().enumerate() {
        let version_id = &entry.version_id;
        tracing::debug!("replaying log entry {version_id}");

        // Version number prefix must equal the 1-based entry index.
        let declared = entry
            .version_number()
            .map_err(|e| Error::ChainIntegrity(format!("{version_id}: {e}")))?;
        if declared != i as u64 + 1 {
            return Err(Error::ChainIntegrity(format!(
                "{version_id}: version number {declared} does not match entry position {}",
                i + 1
            )));
        }

        // The hash suffix must equal the recomputed entry hash.
        let declared_hash = entry.version_id.split_once('-').unwrap_or_default().1;
        let computed = entry.hash()?;
        if computed != declared_hash {
            return Err(Error::ChainIntegrity(format!(
                "{version_id}: entry hash does not match the entry content"
            )));
        }

        if i == 0 {
            check_genesis(entry)?;
            meta.scid = entry.parameters.scid.clone().unwrap_or_default();
            meta.created = entry.version_time;
            genesis_segment = entry.state.id.rsplit(':').next().unwrap_or_default().to_string();
        }

        // The document id must embed the SCID the log is bound to.
        if !entry.state.id.starts_with(&format!("did:webvh:{}:", meta.scid)) {
            return Err(Error::ChainIntegrity(format!(
                "{version_id}: document id {} does not embed the SCID",
                entry.state.id
            )));
        }

        // Timestamps are non-decreasing and never in the future.
        if entry.version_time > Utc::now() {
            return Err(Error::ChainIntegrity(format!("{version_id}: version time is in the future")));
        }
        if let Some(prev) = prev_time {
            if entry.version_time < prev {
                return Err(Error::ChainIntegrity(format!(
                    "{version_id}: version time precedes the previous entry"
                )));
            }
        }

        // While not portable, the DID may not change host.
        if i > 0 && !meta.portable {
            let segment = entry.state.id.rsplit(':').next().unwrap_or_default();
            if segment != genesis_segment {
                return Err(Error::NotPermitted(format!(
                    "{version_id}: host changed for a non-portable DID"
                )));
            }
        }

        // At least one proof must verify under the effective update keys:
        // the keys declared by the previous entry, or for the genesis entry
        // its own (the SCID binds genesis to the identifier).
        let auth_keys = if i == 0 {
            entry.parameters.update_keys.clone().unwrap_or_default()
        } else {
            effective_keys.clone()
        };
        let elide = i != 0 && i < fast_floor;
        if !elide {
            verify::verify_proofs(entry, &auth_keys, verifier, options.verification_keys.as_ref())
                .await?;
        }

        // A pre-rotation commitment from the previous entry constrains any
        // newly declared update keys.
        if let Some(committed) = &committed_hashes {
            if !committed.is_empty() {
                for key in entry.parameters.update_keys.as_deref().unwrap_or_default() {
                    if !committed.contains(&hash::hash_key(key)) {
                        return Err(Error::Unauthorized(format!(
                            "{version_id}: update key {key} is not in the pre-rotation commitment"
                        )));
                    }
                }
            }
        }

        // Nothing follows a deactivation entry.
        if i > 0 && meta.deactivated {
            return Err(Error::NotPermitted(format!(
                "{version_id}: log continues after deactivation"
            )));
        }

        apply_parameters(entry, &mut meta, &mut effective_keys, &mut committed_hashes)?;
        meta.version_id = entry.version_id.clone();
        meta.updated = entry.version_time;

        if has_target && captured.is_none() && matches_target(i, entry, log, options) {
            *captured = Some(snapshot(entry, &meta));
        }
        prev_time = Some(entry.version_time);
    }

    // Witness quorum applies to the tip when proofs were supplied.
    let tip = &log[log.len() - 1];
    if let Some(witness) = &meta.witness {
        if witness.threshold > 0 {
            if let Some(proofs) = witness_proofs {
                verify::verify_witness(tip, witness, proofs, verifier).await?;
            }
        }
    }

    if has_target {
        return captured
            .clone()
            .ok_or_else(|| Error::VersionNotFound(options.describe_target()));
    }
    Ok(snapshot(tip, &meta))
}

// Required fields and SCID derivation for the genesis entry.
fn check_genesis(entry: &LogEntry) -> Result<()> {
    let version_id = &entry.version_id;
    let params = &entry.parameters;

    let Some(method) = &params.method else {
        return Err(Error::InvalidInput(format!("{version_id}: genesis entry must set method")));
    };
    if !method.starts_with("did:webvh:") {
        return Err(Error::InvalidInput(format!(
            "{version_id}: unsupported method {method} - must be 'did:webvh:<version>'"
        )));
    }
    let Some(update_keys) = &params.update_keys else {
        return Err(Error::InvalidInput(format!("{version_id}: genesis entry must set updateKeys")));
    };
    if update_keys.is_empty() {
        return Err(Error::InvalidInput(format!("{version_id}: genesis updateKeys is empty")));
    }
    let Some(scid) = &params.scid else {
        return Err(Error::InvalidInput(format!("{version_id}: genesis entry must set scid")));
    };
    hash::verify_scid(entry, scid).map_err(|e| Error::ChainIntegrity(format!("{version_id}: {e}")))
}

// Fold an entry's parameter delta into the accumulator. Absent fields carry
// forward; present fields re-set.
fn apply_parameters(
    entry: &LogEntry, meta: &mut ResolutionMetadata, effective_keys: &mut Vec<String>,
    committed_hashes: &mut Option<Vec<String>>,
) -> Result<()> {
    let params = &entry.parameters;

    if let Some(scid) = &params.scid {
        if *scid != meta.scid {
            return Err(Error::ChainIntegrity(format!(
                "{}: SCID cannot change from {} to {scid}",
                entry.version_id, meta.scid
            )));
        }
    }
    if let Some(update_keys) = &params.update_keys {
        // takes effect for the next entry
        effective_keys.clone_from(update_keys);
        meta.update_keys.clone_from(update_keys);
    }
    if let Some(next_key_hashes) = &params.next_key_hashes {
        *committed_hashes =
            if next_key_hashes.is_empty() { None } else { Some(next_key_hashes.clone()) };
        meta.next_key_hashes.clone_from(committed_hashes);
    }
    meta.prerotation = committed_hashes.is_some();
    if let Some(portable) = params.portable {
        meta.portable = portable;
    }
    if let Some(witness) = params.effective_witness() {
        verify::validate_witness(&witness)
            .map_err(|e| Error::InvalidInput(format!("{}: {e}", entry.version_id)))?;
        meta.witness = Some(witness);
    }
    if let Some(watchers) = &params.watchers {
        meta.watchers = Some(watchers.clone());
    }
    if let Some(deactivated) = params.deactivated {
        meta.deactivated = deactivated;
    }
    Ok(())
}

// Whether this entry is the one a resolution target selects.
fn matches_target(i: usize, entry: &LogEntry, log: &[LogEntry], options: &ResolutionOptions) -> bool {
    if let Some(version_id) = &options.version_id {
        return entry.version_id == *version_id;
    }
    if let Some(number) = options.version_number {
        return i as u64 + 1 == number;
    }
    if let Some(time) = options.version_time {
        // the version whose [versionTime, next.versionTime) interval
        // contains the target, or the tip when later than all
        if entry.version_time <= time {
            return log.get(i + 1).is_none_or(|next| time < next.version_time);
        }
        return false;
    }
    if let Some(vm) = &options.verification_method {
        return entry.state.has_verification_method(vm);
    }
    false
}

// The emitted view of a version: its document with default services
// injected (after hashing - the injected services never enter the hashed
// state) and a copy of the metadata accumulator.
fn snapshot(entry: &LogEntry, meta: &ResolutionMetadata) -> Resolved {
    let mut document = entry.state.clone();
    inject_default_services(&mut document);
    Resolved {
        did: document.id.clone(),
        document,
        metadata: meta.clone(),
    }
}

// Add the #files and #whois services a did:webvh document is expected to
// expose, where the document does not already declare them.
fn inject_default_services(document: &mut Document) {
    let Ok(url) = document.id.parse::<Url>() else {
        return;
    };
    let base = url.base_url();
    let services = document.service.get_or_insert_with(Vec::new);
    if !services.iter().any(|s| s.id.ends_with("#files")) {
        services.push(Service {
            id: "#files".to_string(),
            type_: "relativeRef".to_string(),
            service_endpoint: OneMany::One(Kind::String(base.clone())),
        });
    }
    if !services.iter().any(|s| s.id.ends_with("#whois")) {
        services.push(Service {
            id: "#whois".to_string(),
            type_: "LinkedVerifiablePresentation".to_string(),
            service_endpoint: OneMany::One(Kind::String(format!("{base}/whois.vp"))),
        });
    }
}
