//! Deactivate (revoke) operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::log::{LogEntry, Parameters, WitnessEntry};
use crate::provider::{Signature, Verifier};
use crate::resolve::{ResolutionMetadata, resolve_log};

/// Builder to deactivate a DID and append the log entry recording it.
///
/// Use this to construct a [`DeactivateResult`].
pub struct DeactivateBuilder<S> {
    log: Vec<LogEntry>,
    witness_proofs: Option<Vec<WitnessEntry>>,
    version_time: Option<DateTime<Utc>>,
    signer: S,
}

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signature>(pub &'a S);

impl DeactivateBuilder<NoSigner> {
    /// Create a new `DeactivateBuilder` from the current log entries.
    #[must_use]
    pub const fn from(log: Vec<LogEntry>) -> Self {
        Self {
            log,
            witness_proofs: None,
            version_time: None,
            signer: NoSigner,
        }
    }

    /// Add a signer holding a private counterpart of one of the current
    /// update keys.
    #[must_use]
    pub fn signer<S: Signature>(self, signer: &S) -> DeactivateBuilder<WithSigner<'_, S>> {
        DeactivateBuilder {
            log: self.log,
            witness_proofs: self.witness_proofs,
            version_time: self.version_time,
            signer: WithSigner(signer),
        }
    }
}

impl<S> DeactivateBuilder<S> {
    /// Supply witness proofs for validation of the existing log. Without
    /// them the witness quorum check is skipped.
    #[must_use]
    pub fn witness_proofs(mut self, proofs: Vec<WitnessEntry>) -> Self {
        self.witness_proofs = Some(proofs);
        self
    }

    /// Set the version time for the deactivation entry. Defaults to the
    /// current time.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl<S: Signature> DeactivateBuilder<WithSigner<'_, S>> {
    /// Build the deactivation log entry.
    ///
    /// Replays the existing log first, refusing to extend a deactivated or
    /// invalid chain, then appends one final entry that sets `deactivated`,
    /// empties the update keys, and clears any pre-rotation commitment.
    ///
    /// # Errors
    ///
    /// Will fail if the existing log does not resolve, the DID is already
    /// deactivated, the signer fails, or the sealed entry does not
    /// validate.
    pub async fn build(self, verifier: &impl Verifier) -> Result<DeactivateResult> {
        let current = resolve_log(&self.log, self.witness_proofs.as_deref(), None, verifier).await?;
        if current.metadata.deactivated {
            return Err(Error::NotPermitted(format!(
                "{}: DID is already deactivated",
                current.metadata.version_id
            )));
        }
        let Some(last_entry) = self.log.last() else {
            return Err(Error::InvalidInput("log contains no entries".to_string()));
        };

        let params = Parameters {
            deactivated: Some(true),
            update_keys: Some(vec![]),
            next_key_hashes: Some(vec![]),
            ..Parameters::default()
        };

        let version_time = self.version_time.unwrap_or_else(Utc::now);
        let mut document = last_entry.state.clone();
        document.deactivated = Some(true);
        if let Some(md) = &mut document.did_document_metadata {
            md.updated = Some(version_time);
            md.deactivated = Some(true);
        }

        let mut entry = LogEntry {
            version_id: last_entry.version_id.clone(),
            version_time,
            parameters: params,
            state: document,
            proof: vec![],
        };

        let version_number = last_entry.version_number().map_err(Error::External)? + 1;
        let entry_hash = entry.hash()?;
        entry.version_id = format!("{version_number}-{entry_hash}");
        entry.sign(self.signer.0).await?;

        let mut log = self.log;
        log.push(entry);

        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(DeactivateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of a `deactivate` operation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DeactivateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved DID document as of deactivation.
    pub document: Document,

    /// Resolution metadata for the final version.
    pub metadata: ResolutionMetadata,

    /// The original log appended with the deactivation entry.
    pub log: Vec<LogEntry>,
}
