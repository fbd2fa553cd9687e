//! Tests for resolving a `did:webvh` log into a DID document and metadata.

use chrono::{TimeZone, Utc};
use didwebvh::{
    CreateBuilder, Document, DocumentBuilder, Error, Fetcher, MethodType, ProofChecks,
    ResolutionOptions, UpdateBuilder, VerificationMethodBuilder, VmKeyId, default_did, resolve_did,
    resolve_log, to_jsonl,
};
use kms::{Ed25519Verifier, Keyring};

fn new_document(did: &str, signer: &Keyring) -> Document {
    let vm = VerificationMethodBuilder::new(signer.multibase())
        .key_id(did, VmKeyId::Index(0))
        .method_type(MethodType::Ed25519VerificationKey2020)
        .build();
    DocumentBuilder::new(did).verification_method(vm).build()
}

// A three-version log with pinned timestamps, for version targeting tests.
async fn three_versions(signer: &Keyring) -> didwebvh::DidLog {
    let t = |day| Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).single().expect("should be a time");

    let did = default_did("https://credibil.io").expect("should get default DID");
    let doc = new_document(&did, signer);
    let created = CreateBuilder::new()
        .document(doc)
        .expect("should apply document")
        .update_keys(vec![signer.multibase()])
        .expect("should apply update keys")
        .version_time(t(1))
        .signer(signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should build genesis entry");

    let vm2 = VerificationMethodBuilder::new(Keyring::new().multibase())
        .key_id(&created.did, VmKeyId::Index(1))
        .method_type(MethodType::Ed25519VerificationKey2020)
        .build();
    let doc2 = DocumentBuilder::from(created.document.clone()).verification_method(vm2).build();
    let updated = UpdateBuilder::from(created.log)
        .document(&doc2)
        .version_time(t(3))
        .signer(signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should build second entry");

    let doc3 = DocumentBuilder::from(updated.document.clone())
        .also_known_as("https://credibil.io/profile")
        .build();
    let updated = UpdateBuilder::from(updated.log)
        .document(&doc3)
        .version_time(t(5))
        .signer(signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should build third entry");

    updated.log
}

// Resolve explicit version targets: by id, number, time, and verification
// method.
#[tokio::test]
async fn version_targets() {
    let signer = Keyring::new();
    let log = three_versions(&signer).await;

    let options = ResolutionOptions {
        version_number: Some(2),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve version 2");
    assert_eq!(resolved.metadata.version_id, log[1].version_id);

    let options = ResolutionOptions {
        version_id: Some(log[0].version_id.clone()),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve version 1");
    assert_eq!(resolved.metadata.version_id, log[0].version_id);

    // a time between versions 2 and 3 selects version 2
    let t = Utc.with_ymd_and_hms(2024, 6, 4, 0, 0, 0).single().expect("should be a time");
    let options = ResolutionOptions {
        version_time: Some(t),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve by time");
    assert_eq!(resolved.metadata.version_id, log[1].version_id);

    // a time after every version selects the tip
    let t = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).single().expect("should be a time");
    let options = ResolutionOptions {
        version_time: Some(t),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve by time");
    assert_eq!(resolved.metadata.version_id, log[2].version_id);

    // a time before the first version matches nothing
    let t = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).single().expect("should be a time");
    let options = ResolutionOptions {
        version_time: Some(t),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::VersionNotFound(_))));

    // the first version in which a verification method appears
    let vm_id = format!("{}#key-1", log[0].state.id);
    let options = ResolutionOptions {
        verification_method: Some(vm_id),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve by verification method");
    assert_eq!(resolved.metadata.version_id, log[1].version_id);
}

// Tampering with any entry's state breaks resolution.
#[tokio::test]
async fn tampered_state_rejected() {
    let signer = Keyring::new();
    let mut log = three_versions(&signer).await;

    log[1].state.also_known_as = Some(vec!["https://evil.example.com".to_string()]);

    let resolved = resolve_log(&log, None, None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::ChainIntegrity(_))));
}

// A broken tip does not prevent resolution of an intact, explicitly
// requested prior version.
#[tokio::test]
async fn prior_version_survives_broken_tip() {
    let signer = Keyring::new();
    let mut log = three_versions(&signer).await;

    log[2].state.also_known_as = Some(vec!["https://evil.example.com".to_string()]);

    // without a target the failure propagates
    let resolved = resolve_log(&log, None, None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::ChainIntegrity(_))));

    // with a satisfied target the captured snapshot is returned
    let options = ResolutionOptions {
        version_number: Some(1),
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("should resolve version 1 despite broken tip");
    assert_eq!(resolved.metadata.version_id, log[0].version_id);
}

// Default services are injected into the emitted document without altering
// the hashed state.
#[tokio::test]
async fn default_services_injected() {
    let signer = Keyring::new();
    let log = three_versions(&signer).await;

    let resolved =
        resolve_log(&log, None, None, &Ed25519Verifier).await.expect("should resolve log");
    let services = resolved.document.service.expect("should have services");
    let files = services.iter().find(|s| s.id == "#files").expect("should have #files");
    assert_eq!(files.type_, "relativeRef");
    let whois = services.iter().find(|s| s.id == "#whois").expect("should have #whois");
    assert_eq!(whois.type_, "LinkedVerifiablePresentation");

    // the log entries themselves are untouched
    assert!(log[2].state.service.is_none());
}

// Fast resolution verifies proofs only at the edges of the log; full
// resolution checks everything.
#[tokio::test]
async fn fast_resolution() {
    let signer = Keyring::new();
    let did = default_did("https://credibil.io").expect("should get default DID");
    let doc = new_document(&did, &signer);

    let created = CreateBuilder::new()
        .document(doc)
        .expect("should apply document")
        .update_keys(vec![signer.multibase()])
        .expect("should apply update keys")
        .signer(&signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should build genesis entry");

    let mut log = created.log;
    let doc = created.document;
    for _ in 0..11 {
        let updated = UpdateBuilder::from(log)
            .document(&doc)
            .signer(&signer)
            .build(&Ed25519Verifier)
            .await
            .expect("should build update entry");
        log = updated.log;
    }
    assert_eq!(log.len(), 12);

    // corrupt the second entry's signature; its hash is unaffected
    log[1].proof[0].proof_value = Some("z2NEpo7TZRRrLZSi2U".to_string());

    let resolved = resolve_log(&log, None, None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::Unauthorized(_))));

    let options = ResolutionOptions {
        proof_checks: ProofChecks::Fast,
        ..ResolutionOptions::default()
    };
    let resolved = resolve_log(&log, None, Some(options), &Ed25519Verifier)
        .await
        .expect("fast resolution should elide interior proofs");
    assert_eq!(resolved.metadata.version_id, log[11].version_id);
}

// The fetching facade: derive the log URL from the DID, fetch, replay, and
// cross-check the embedded SCID.
#[tokio::test]
async fn resolve_by_did() {
    let signer = Keyring::new();
    let log = three_versions(&signer).await;
    let did = log[0].state.id.clone();

    #[derive(Clone)]
    struct MockFetcher(String);
    impl Fetcher for MockFetcher {
        async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            assert!(url.ends_with("/did.jsonl"));
            Ok(self.0.clone().into_bytes())
        }
    }

    let fetcher = MockFetcher(to_jsonl(&log).expect("should serialize"));
    let resolved = resolve_did(&did, &fetcher, &Ed25519Verifier, None)
        .await
        .expect("should resolve DID");
    assert_eq!(resolved.did, did);
    assert_eq!(resolved.metadata.version_id, log[2].version_id);

    // a DID whose SCID does not match the log is rejected
    let wrong = "did:webvh:zQmWrongScid:credibil.io";
    let resolved = resolve_did(wrong, &fetcher, &Ed25519Verifier, None).await;
    assert!(matches!(resolved, Err(Error::ChainIntegrity(_))));
}
