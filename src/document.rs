//! # DID Document
//!
//! The subset of the W3C DID document model the log engine reads and
//! writes, plus builders for assembling documents and their verification
//! methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Kind, OneMany};

/// DID Document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The context of the DID document.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// The DID for the document subject.
    pub id: String,

    /// A set of URIs that are other identifiers for the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    /// Controller(s) whose verification methods are accepted as
    /// authoritative for this document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OneMany<String>>,

    /// Verification methods for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// How the DID subject is expected to be authenticated. Either a
    /// reference to a verification method or a standalone method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Kind<VerificationMethod>>>,

    /// How the DID subject is expected to express claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<Kind<VerificationMethod>>>,

    /// Ways of communicating with the DID subject or related entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    /// Set when the DID has been deactivated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,

    /// Metadata about the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DocumentMetadata>,
}

impl Document {
    /// A copy of the document with all secret key material removed.
    ///
    /// Log entry construction runs every proposed document through this so
    /// that private keys can never appear in the published `state`.
    #[must_use]
    pub fn scrubbed(&self) -> Self {
        let mut doc = self.clone();
        if let Some(methods) = &mut doc.verification_method {
            for vm in methods {
                vm.secret_key_multibase = None;
            }
        }
        for relationship in [&mut doc.authentication, &mut doc.assertion_method] {
            if let Some(methods) = relationship {
                for vm in methods.iter_mut() {
                    if let Kind::Object(vm) = vm {
                        vm.secret_key_multibase = None;
                    }
                }
            }
        }
        doc
    }

    /// Whether the document declares or references a verification method
    /// with the given id.
    #[must_use]
    pub fn has_verification_method(&self, id: &str) -> bool {
        if let Some(methods) = &self.verification_method {
            if methods.iter().any(|vm| vm.id == id) {
                return true;
            }
        }
        [&self.authentication, &self.assertion_method].into_iter().flatten().any(|methods| {
            methods.iter().any(|vm| match vm {
                Kind::String(reference) => reference == id,
                Kind::Object(vm) => vm.id == id,
            })
        })
    }
}

/// Metadata about a DID document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Timestamp of the document's creation.
    pub created: DateTime<Utc>,

    /// Timestamp of the last update to the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Set when the DID has been deactivated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
}

/// A service endpoint associated with the DID subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// A URI unique to the service.
    pub id: String,

    /// The service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// One or more endpoints for the service.
    #[allow(clippy::struct_field_names)]
    pub service_endpoint: OneMany<Kind<Value>>,
}

/// A cryptographic public key that can be used to authenticate or authorize
/// interactions with the DID subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// A DID URL that identifies the verification method.
    pub id: String,

    /// The type of verification method.
    #[serde(rename = "type")]
    pub type_: MethodType,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// The public key in Multikey format.
    pub public_key_multibase: String,

    /// Secret key material. Accepted on input so that callers can pass
    /// documents around whole, but stripped before an entry is built and
    /// never published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key_multibase: Option<String>,
}

/// Verification method types supported by this crate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub enum MethodType {
    /// Generic Multikey format.
    #[default]
    Multikey,

    /// `ED25519` Verification key, version 2020.
    Ed25519VerificationKey2020,
}

/// A builder for creating a DID Document.
#[derive(Clone, Debug, Default)]
pub struct DocumentBuilder {
    doc: Document,
    existing: bool,
}

impl DocumentBuilder {
    /// Start a new document for the given DID.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        let doc = Document {
            id: did.into(),
            ..Document::default()
        };
        Self { doc, existing: false }
    }

    /// Start from an existing document, preserving its creation metadata.
    #[must_use]
    pub const fn from(doc: Document) -> Self {
        Self { doc, existing: true }
    }

    /// The DID under construction.
    #[must_use]
    pub fn did(&self) -> &str {
        &self.doc.id
    }

    /// Add a context in addition to any already present.
    #[must_use]
    pub fn context(mut self, context: Kind<Value>) -> Self {
        self.doc.context.push(context);
        self
    }

    /// Add an also-known-as identifier.
    #[must_use]
    pub fn also_known_as(mut self, aka: impl Into<String>) -> Self {
        self.doc.also_known_as.get_or_insert(vec![]).push(aka.into());
        self
    }

    /// Add a controller.
    ///
    /// Chain to add multiple controllers.
    #[must_use]
    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        match &mut self.doc.controller {
            Some(existing) => existing.add(controller.into()),
            None => self.doc.controller = Some(OneMany::One(controller.into())),
        }
        self
    }

    /// Add a standalone verification method.
    ///
    /// Chain to add multiple methods.
    #[must_use]
    pub fn verification_method(mut self, vm: VerificationMethod) -> Self {
        self.doc.verification_method.get_or_insert(vec![]).push(vm);
        self
    }

    /// Add an authentication relationship: either a reference (the id of a
    /// declared verification method) or a standalone method.
    #[must_use]
    pub fn authentication(mut self, vm: impl Into<Kind<VerificationMethod>>) -> Self {
        self.doc.authentication.get_or_insert(vec![]).push(vm.into());
        self
    }

    /// Add an assertion-method relationship: either a reference or a
    /// standalone method.
    #[must_use]
    pub fn assertion_method(mut self, vm: impl Into<Kind<VerificationMethod>>) -> Self {
        self.doc.assertion_method.get_or_insert(vec![]).push(vm.into());
        self
    }

    /// Add a service endpoint.
    ///
    /// Chain to add multiple service endpoints.
    #[must_use]
    pub fn add_service(mut self, service: Service) -> Self {
        self.doc.service.get_or_insert(vec![]).push(service);
        self
    }

    /// Apply document metadata and build the document.
    #[must_use]
    pub fn build(mut self) -> Document {
        if self.doc.context.is_empty() {
            self.doc.context =
                crate::BASE_CONTEXT.map(|c| Kind::String(c.to_string())).to_vec();
        }
        let now = Utc::now();
        if self.existing {
            let md = self.doc.did_document_metadata.get_or_insert_with(|| DocumentMetadata {
                created: now,
                ..DocumentMetadata::default()
            });
            md.updated = Some(now);
        } else {
            self.doc.did_document_metadata = Some(DocumentMetadata {
                created: now,
                ..DocumentMetadata::default()
            });
        }
        self.doc
    }
}

/// How to construct the key id for a verification method.
pub enum VmKeyId {
    /// Use the multibase key of the entity authorizing the method, appended
    /// to the DID as a fragment.
    Authorization(String),

    /// Use the method's own public key as the fragment.
    Verification,

    /// Use an index-based fragment, `<did>#key-<index>`.
    Index(u32),
}

/// A builder for creating a verification method.
#[derive(Clone, Debug, Default)]
pub struct VerificationMethodBuilder {
    multikey: String,
    did: String,
    kid: String,
    method: MethodType,
}

impl VerificationMethodBuilder {
    /// Start a verification method for the given Multikey public key.
    #[must_use]
    pub fn new(public_key_multibase: impl Into<String>) -> Self {
        Self {
            multikey: public_key_multibase.into(),
            ..Self::default()
        }
    }

    /// Specify how to construct the key id.
    #[must_use]
    pub fn key_id(mut self, did: impl Into<String>, id_type: VmKeyId) -> Self {
        self.did = did.into();
        self.kid = match id_type {
            VmKeyId::Authorization(auth_key) => format!("{}#{auth_key}", self.did),
            VmKeyId::Verification => format!("{}#{}", self.did, self.multikey),
            VmKeyId::Index(index) => format!("{}#key-{index}", self.did),
        };
        self
    }

    /// Specify the verification method type.
    #[must_use]
    pub fn method_type(mut self, method: MethodType) -> Self {
        self.method = method;
        self
    }

    /// Build the verification method.
    #[must_use]
    pub fn build(self) -> VerificationMethod {
        VerificationMethod {
            id: self.kid,
            controller: self.did,
            type_: self.method,
            public_key_multibase: self.multikey,
            secret_key_multibase: None,
        }
    }
}

/// A builder for creating a service endpoint.
#[derive(Clone, Debug, Default)]
pub struct ServiceBuilder {
    id: String,
    type_: String,
    endpoints: Vec<Kind<Value>>,
}

impl ServiceBuilder {
    /// Start a service with the given id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the service type.
    #[must_use]
    pub fn service_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = type_.into();
        self
    }

    /// Add an endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(Kind::String(endpoint.into()));
        self
    }

    /// Build the service.
    #[must_use]
    pub fn build(mut self) -> Service {
        let service_endpoint = if self.endpoints.len() == 1 {
            OneMany::One(self.endpoints.remove(0))
        } else {
            OneMany::Many(self.endpoints)
        };
        Service {
            id: self.id,
            type_: self.type_,
            service_endpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(id: &str, secret: Option<&str>) -> VerificationMethod {
        VerificationMethod {
            id: id.to_string(),
            type_: MethodType::Multikey,
            controller: "did:webvh:scid:example.com".to_string(),
            public_key_multibase: "z6MkpublicKey".to_string(),
            secret_key_multibase: secret.map(ToString::to_string),
        }
    }

    #[test]
    fn scrub_removes_secret_material() {
        let doc = DocumentBuilder::new("did:webvh:scid:example.com")
            .verification_method(method("did:webvh:scid:example.com#key-0", Some("z3secret")))
            .authentication(Kind::Object(method("did:webvh:scid:example.com#key-1", Some("z3s"))))
            .build();

        let scrubbed = doc.scrubbed();
        let methods = scrubbed.verification_method.as_ref().expect("should have methods");
        assert!(methods[0].secret_key_multibase.is_none());
        let Some(Kind::Object(auth)) = scrubbed.authentication.as_ref().map(|a| &a[0]) else {
            panic!("should have an embedded authentication method");
        };
        assert!(auth.secret_key_multibase.is_none());

        let serialized = serde_json::to_string(&scrubbed).expect("should serialize");
        assert!(!serialized.contains("secretKeyMultibase"));
    }

    #[test]
    fn method_references() {
        let doc = DocumentBuilder::new("did:webvh:scid:example.com")
            .verification_method(method("did:webvh:scid:example.com#key-0", None))
            .authentication("did:webvh:scid:example.com#key-0".to_string())
            .build();

        assert!(doc.has_verification_method("did:webvh:scid:example.com#key-0"));
        assert!(!doc.has_verification_method("did:webvh:scid:example.com#key-9"));
    }

    #[test]
    fn builder_key_ids() {
        let vm = VerificationMethodBuilder::new("z6MkvmKey")
            .key_id("did:webvh:scid:example.com", VmKeyId::Index(2))
            .method_type(MethodType::Ed25519VerificationKey2020)
            .build();
        assert_eq!(vm.id, "did:webvh:scid:example.com#key-2");
        assert_eq!(vm.controller, "did:webvh:scid:example.com");

        let vm = VerificationMethodBuilder::new("z6MkvmKey")
            .key_id("did:webvh:scid:example.com", VmKeyId::Verification)
            .build();
        assert_eq!(vm.id, "did:webvh:scid:example.com#z6MkvmKey");
    }
}
