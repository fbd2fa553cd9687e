//! Update operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::log::{LogEntry, Parameters, Witness, WitnessEntry};
use crate::provider::{Signature, Verifier};
use crate::resolve::{ResolutionMetadata, resolve_log};
use crate::hash;
use crate::verify::validate_witness;

/// Builder to update a DID document and append the log entry describing the
/// change.
///
/// Use this to construct an [`UpdateResult`].
pub struct UpdateBuilder<D, S> {
    log: Vec<LogEntry>,
    witness_proofs: Option<Vec<WitnessEntry>>,
    update_keys: Option<Vec<String>>,
    next_keys: Option<Vec<String>>,
    portable: Option<bool>,
    witness: Option<Witness>,
    watchers: Option<Vec<String>>,
    ttl: Option<u64>,
    version_time: Option<DateTime<Utc>>,
    document: D,
    signer: S,
}

/// Builder does not have a document (can't build).
pub struct NoDocument;

/// Builder has a document (can build).
pub struct WithDocument(Document);

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signature>(pub &'a S);

impl UpdateBuilder<NoDocument, NoSigner> {
    /// Create a new `UpdateBuilder` from the current log entries.
    #[must_use]
    pub const fn from(log: Vec<LogEntry>) -> Self {
        Self {
            log,
            witness_proofs: None,
            update_keys: None,
            next_keys: None,
            portable: None,
            witness: None,
            watchers: None,
            ttl: None,
            version_time: None,
            document: NoDocument,
            signer: NoSigner,
        }
    }

    /// Add the new DID document.
    ///
    /// Secret key material is stripped from the document before it enters
    /// the log.
    #[must_use]
    pub fn document(self, document: &Document) -> UpdateBuilder<WithDocument, NoSigner> {
        UpdateBuilder {
            log: self.log,
            witness_proofs: self.witness_proofs,
            update_keys: self.update_keys,
            next_keys: self.next_keys,
            portable: self.portable,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            document: WithDocument(document.scrubbed()),
            signer: NoSigner,
        }
    }
}

impl UpdateBuilder<WithDocument, NoSigner> {
    /// Add a signer holding a private counterpart of one of the *current*
    /// update keys.
    ///
    /// Newly rotated keys take effect for the next entry, not this one, so
    /// they must not be used to sign it.
    #[must_use]
    pub fn signer<S: Signature>(self, signer: &S) -> UpdateBuilder<WithDocument, WithSigner<'_, S>> {
        UpdateBuilder {
            log: self.log,
            witness_proofs: self.witness_proofs,
            update_keys: self.update_keys,
            next_keys: self.next_keys,
            portable: self.portable,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            document: self.document,
            signer: WithSigner(signer),
        }
    }
}

impl<D, S> UpdateBuilder<D, S> {
    /// Supply witness proofs for validation of the existing log. Without
    /// them the witness quorum check is skipped.
    #[must_use]
    pub fn witness_proofs(mut self, proofs: Vec<WitnessEntry>) -> Self {
        self.witness_proofs = Some(proofs);
        self
    }

    /// Rotate the update keys.
    ///
    /// `update_keys` are the Multikey-format public keys authorized to sign
    /// the *next* log entry. When the current entry carries a pre-rotation
    /// commitment, each new update key must hash into it.
    ///
    /// `next_keys` are the public keys to commit to for the following
    /// rotation; they are hashed here. Pass an empty list to clear an
    /// outstanding commitment and leave pre-rotation off.
    #[must_use]
    pub fn rotate_keys(mut self, update_keys: Vec<String>, next_keys: Vec<String>) -> Self {
        self.update_keys = Some(update_keys);
        self.next_keys = Some(next_keys);
        self
    }

    /// Set the DID to be portable or not. Inherits the current setting
    /// unless overridden here.
    #[must_use]
    pub const fn portable(mut self, portable: bool) -> Self {
        self.portable = Some(portable);
        self
    }

    /// Replace the set of witnesses for the DID. Inherits the current
    /// witness information unless overridden here.
    ///
    /// # Errors
    ///
    /// Will fail if the witness threshold is zero or unreachable, the
    /// witness list is empty or holds duplicates, or an id is not a DID.
    pub fn witness(mut self, witness: &Witness) -> Result<Self> {
        validate_witness(witness)?;
        self.witness = Some(witness.clone());
        Ok(self)
    }

    /// Replace the watcher URIs for the DID. Advisory only.
    #[must_use]
    pub fn watchers(mut self, watchers: Vec<String>) -> Self {
        self.watchers = Some(watchers);
        self
    }

    /// Set the permissable cache time in seconds for the DID.
    #[must_use]
    pub const fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the version time for the new entry. Defaults to the current
    /// time. Must not precede the previous entry's version time.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl<S: Signature> UpdateBuilder<WithDocument, WithSigner<'_, S>> {
    /// Build the update log entry.
    ///
    /// Replays the existing log first, refusing to extend a deactivated or
    /// invalid chain, then appends one new entry and re-validates the
    /// result.
    ///
    /// # Errors
    ///
    /// Will fail if the existing log does not resolve, the DID is
    /// deactivated, a non-portable DID changes host, a rotation violates
    /// the pre-rotation commitment, the signer fails, or the sealed entry
    /// does not validate.
    pub async fn build(self, verifier: &impl Verifier) -> Result<UpdateResult> {
        let current = resolve_log(&self.log, self.witness_proofs.as_deref(), None, verifier).await?;
        if current.metadata.deactivated {
            return Err(Error::NotPermitted(format!(
                "{}: cannot update a deactivated DID",
                current.metadata.version_id
            )));
        }
        let Some(last_entry) = self.log.last() else {
            return Err(Error::InvalidInput("log contains no entries".to_string()));
        };

        // The DID may only move host when portable, and never to a
        // different SCID.
        let document = self.document.0;
        if document.id != last_entry.state.id {
            if !current.metadata.portable {
                return Err(Error::NotPermitted(format!(
                    "{}: host changed for a non-portable DID",
                    current.metadata.version_id
                )));
            }
            if !document.id.starts_with(&format!("did:webvh:{}:", current.metadata.scid)) {
                return Err(Error::ChainIntegrity(format!(
                    "document id {} does not embed the SCID {}",
                    document.id, current.metadata.scid
                )));
            }
        }

        // A pre-rotation commitment constrains any newly declared keys.
        let mut params = Parameters::default();
        if let Some(update_keys) = self.update_keys {
            if let Some(committed) = &current.metadata.next_key_hashes {
                for key in &update_keys {
                    if !committed.contains(&hash::hash_key(key)) {
                        return Err(Error::Unauthorized(format!(
                            "update key {key} is not in the pre-rotation commitment"
                        )));
                    }
                }
            }
            params.update_keys = Some(update_keys);
            params.next_key_hashes =
                self.next_keys.map(|keys| keys.iter().map(|k| hash::hash_key(k)).collect());
        }
        params.portable = self.portable;
        params.witness = self.witness;
        params.watchers = self.watchers;
        params.ttl = self.ttl;

        let version_time = self.version_time.unwrap_or_else(Utc::now);
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

        // Re-validate the extended log; the witness quorum over the new tip
        // is a global property checked at resolution time.
        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(UpdateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of an `update` operation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved DID document.
    pub document: Document,

    /// Resolution metadata for the new version.
    pub metadata: ResolutionMetadata,

    /// The original log appended with the entry describing the update.
    pub log: Vec<LogEntry>,
}
