//! Create operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::log::{LogEntry, Parameters, Witness};
use crate::provider::{Signature, Verifier};
use crate::resolve::{ResolutionMetadata, resolve_log};
use crate::verify::validate_witness;
use crate::{METHOD_VERSION, SCID_PLACEHOLDER, hash};

/// Builder to create a new `did:webvh` document and its genesis log entry.
///
/// Use this to construct a [`CreateResult`].
pub struct CreateBuilder<U, S, D> {
    portable: bool,
    next_key_hashes: Option<Vec<String>>,
    witness: Option<Witness>,
    watchers: Option<Vec<String>>,
    ttl: Option<u64>,
    version_time: Option<DateTime<Utc>>,
    update_keys: U,
    signer: S,
    document: D,
}

/// Builder does not have update keys (can't build).
pub struct NoUpdateKeys;

/// Builder has update keys (can build).
pub struct WithUpdateKeys(Vec<String>);

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signature>(pub &'a S);

/// Builder does not have a document (can't build).
pub struct NoDocument;

/// Builder has a document (can build).
pub struct WithDocument(Document);

impl Default for CreateBuilder<NoUpdateKeys, NoSigner, NoDocument> {
    fn default() -> Self {
        Self::new()
    }
}

impl CreateBuilder<NoUpdateKeys, NoSigner, NoDocument> {
    /// Create a new `CreateBuilder`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            portable: false,
            next_key_hashes: None,
            witness: None,
            watchers: None,
            ttl: None,
            version_time: None,
            update_keys: NoUpdateKeys,
            signer: NoSigner,
            document: NoDocument,
        }
    }

    /// Add the proposed DID document.
    ///
    /// The document id must be a placeholder-bearing DID, as constructed by
    /// [`crate::url::default_did`]. Secret key material is stripped from the
    /// document before it enters the log.
    ///
    /// # Errors
    ///
    /// Will fail if the document id does not carry the SCID placeholder.
    pub fn document(
        self, document: Document,
    ) -> Result<CreateBuilder<NoUpdateKeys, NoSigner, WithDocument>> {
        let expect = format!("did:webvh:{SCID_PLACEHOLDER}:");
        if !document.id.starts_with(&expect) {
            return Err(Error::InvalidInput(format!(
                "document id {} must start with {expect}",
                document.id
            )));
        }
        Ok(CreateBuilder {
            portable: self.portable,
            next_key_hashes: self.next_key_hashes,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            update_keys: NoUpdateKeys,
            signer: NoSigner,
            document: WithDocument(document.scrubbed()),
        })
    }
}

impl CreateBuilder<NoUpdateKeys, NoSigner, WithDocument> {
    /// Add the update keys: the Multikey-format public keys authorized to
    /// sign log entries for the DID.
    ///
    /// # Errors
    ///
    /// Will fail if the update keys are empty.
    pub fn update_keys(
        self, update_keys: Vec<String>,
    ) -> Result<CreateBuilder<WithUpdateKeys, NoSigner, WithDocument>> {
        if update_keys.is_empty() {
            return Err(Error::InvalidInput("update keys must not be empty".to_string()));
        }
        Ok(CreateBuilder {
            portable: self.portable,
            next_key_hashes: self.next_key_hashes,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            update_keys: WithUpdateKeys(update_keys),
            signer: NoSigner,
            document: self.document,
        })
    }
}

impl CreateBuilder<WithUpdateKeys, NoSigner, WithDocument> {
    /// Add a signer holding a private counterpart of one of the update
    /// keys.
    #[must_use]
    pub fn signer<S: Signature>(
        self, signer: &S,
    ) -> CreateBuilder<WithUpdateKeys, WithSigner<'_, S>, WithDocument> {
        CreateBuilder {
            portable: self.portable,
            next_key_hashes: self.next_key_hashes,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            update_keys: self.update_keys,
            signer: WithSigner(signer),
            document: self.document,
        }
    }
}

impl<U, S, D> CreateBuilder<U, S, D> {
    /// Set the DID to be portable or not (defaults to not portable).
    #[must_use]
    pub const fn portable(mut self, portable: bool) -> Self {
        self.portable = portable;
        self
    }

    /// Add a pre-rotation commitment for a key that may become an update
    /// key in the next rotation.
    ///
    /// Pass the Multikey-encoded public key; this function hashes it.
    /// Chain to commit to multiple keys.
    #[must_use]
    pub fn next_key(mut self, next_key_multi: &str) -> Self {
        self.next_key_hashes.get_or_insert(vec![]).push(hash::hash_key(next_key_multi));
        self
    }

    /// Add a set of witnesses for the DID.
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

    /// Add watcher URIs for the DID. Advisory only.
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

    /// Set the version time for the genesis entry. Defaults to the
    /// document's creation timestamp, or the current time.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl<S: Signature> CreateBuilder<WithUpdateKeys, WithSigner<'_, S>, WithDocument> {
    /// Build the genesis log entry: derive the SCID, substitute it for the
    /// placeholder, compute the version id, sign, and re-validate the
    /// sealed entry.
    ///
    /// # Errors
    ///
    /// Will fail if hashing or placeholder substitution fails, the signer
    /// fails, or the sealed entry does not validate.
    pub async fn build(self, verifier: &impl Verifier) -> Result<CreateResult> {
        let document = self.document.0;

        let params = Parameters {
            method: Some(METHOD_VERSION.to_string()),
            scid: Some(SCID_PLACEHOLDER.to_string()),
            update_keys: Some(self.update_keys.0),
            portable: Some(self.portable),
            next_key_hashes: self.next_key_hashes,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            ..Parameters::default()
        };

        let version_time = self.version_time.unwrap_or_else(|| {
            document.did_document_metadata.as_ref().map_or_else(Utc::now, |m| m.created)
        });
        let entry = LogEntry {
            version_id: SCID_PLACEHOLDER.to_string(),
            version_time,
            parameters: params,
            state: document,
            proof: vec![],
        };

        // The SCID is the hash of the placeholder-bearing entry.
        let scid = hash::derive_scid(&entry)?;

        // Substitute the SCID for the placeholder throughout the entry.
        let mut value = serde_json::to_value(&entry)?;
        hash::substitute(&mut value, SCID_PLACEHOLDER, &scid);
        let mut entry = serde_json::from_value::<LogEntry>(value)?;

        // Version the substituted entry and sign it.
        let entry_hash = entry.hash()?;
        entry.version_id = format!("1-{entry_hash}");
        entry.sign(self.signer.0).await?;

        // Re-validate the sealed entry in isolation. The witness check is a
        // tip-only global property and is not applied here.
        let log = vec![entry];
        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(CreateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of a `create` operation.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved DID document.
    pub document: Document,

    /// Resolution metadata for the genesis version.
    pub metadata: ResolutionMetadata,

    /// Version history log with the single genesis entry, suitable for
    /// writing to a `did.jsonl` file.
    pub log: Vec<LogEntry>,
}
