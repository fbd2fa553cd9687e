//! Tests for proof verification and the witness quorum check.

use didwebvh::{
    CreateBuilder, CreateResult, Document, DocumentBuilder, Error, MethodType, ServiceBuilder,
    VerificationMethodBuilder, VmKeyId, Witness, WitnessEntry, WitnessWeight, default_did,
    parse_jsonl, resolve_log, to_jsonl,
};
use kms::{Ed25519Verifier, Keyring};

fn new_document(did: &str, signer: &Keyring) -> Document {
    let vm = VerificationMethodBuilder::new(signer.multibase())
        .key_id(did, VmKeyId::Index(0))
        .method_type(MethodType::Ed25519VerificationKey2020)
        .build();
    let service = ServiceBuilder::new(format!("{did}#whois"))
        .service_type("LinkedVerifiablePresentation")
        .endpoint("https://credibil.io/.well-known/whois")
        .build();
    DocumentBuilder::new(did).verification_method(vm).add_service(service).build()
}

// A witnessed DID: three witnesses with weights 50, 40, and 10 and a
// threshold of 60.
async fn witnessed_did(signer: &Keyring, witnesses: &[&Keyring]) -> CreateResult {
    let did = default_did("https://credibil.io/issuers/example").expect("should get default DID");
    let doc = new_document(&did, signer);

    let weights = [50, 40, 10];
    let witness = Witness {
        threshold: 60,
        witnesses: witnesses
            .iter()
            .zip(weights)
            .map(|(w, weight)| WitnessWeight {
                id: w.did_key().split('#').next().expect("should split").to_string(),
                weight: Some(weight),
            })
            .collect(),
    };

    CreateBuilder::new()
        .document(doc)
        .expect("should apply document")
        .update_keys(vec![signer.multibase()])
        .expect("should apply update keys")
        .witness(&witness)
        .expect("witness information should be applied")
        .signer(signer)
        .build(&Ed25519Verifier)
        .await
        .expect("should build genesis entry")
}

// Witness proofs meeting the threshold pass; a single proof below it fails.
#[tokio::test]
async fn witness_quorum() {
    let signer = Keyring::new();
    let w1 = Keyring::new();
    let w2 = Keyring::new();
    let w3 = Keyring::new();
    let created = witnessed_did(&signer, &[&w1, &w2, &w3]).await;

    let tip = &created.log[0];
    let proof1 = tip.proof(&w1).await.expect("should create witness proof");
    let proof2 = tip.proof(&w2).await.expect("should create witness proof");

    // 50 + 40 >= 60
    let proofs = vec![WitnessEntry {
        version_id: tip.version_id.clone(),
        proof: vec![proof1, proof2.clone()],
    }];
    let resolved = resolve_log(&created.log, Some(&proofs), None, &Ed25519Verifier)
        .await
        .expect("should resolve with quorum");
    assert_eq!(resolved.document, created.document);

    // 40 < 60
    let proofs = vec![WitnessEntry {
        version_id: tip.version_id.clone(),
        proof: vec![proof2.clone()],
    }];
    let resolved = resolve_log(&created.log, Some(&proofs), None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::WitnessQuorum(_))));

    // the same witness cannot be counted twice
    let proofs = vec![WitnessEntry {
        version_id: tip.version_id.clone(),
        proof: vec![proof2.clone(), proof2.clone()],
    }];
    let resolved = resolve_log(&created.log, Some(&proofs), None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::WitnessQuorum(_))));

    // proofs for a different version do not count
    let proofs = vec![WitnessEntry {
        version_id: "2-zQmSomethingElse".to_string(),
        proof: vec![proof2],
    }];
    let resolved = resolve_log(&created.log, Some(&proofs), None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::WitnessQuorum(_))));

    // without supplied proofs the check is skipped
    resolve_log(&created.log, None, None, &Ed25519Verifier)
        .await
        .expect("should resolve without witness proofs");
}

// A proof from a signer outside the declared witness list contributes
// nothing.
#[tokio::test]
async fn stranger_witness_ignored() {
    let signer = Keyring::new();
    let w1 = Keyring::new();
    let w2 = Keyring::new();
    let w3 = Keyring::new();
    let created = witnessed_did(&signer, &[&w1, &w2, &w3]).await;

    let tip = &created.log[0];
    let stranger = Keyring::new();
    let proof = tip.proof(&stranger).await.expect("should create proof");

    let proofs = vec![WitnessEntry {
        version_id: tip.version_id.clone(),
        proof: vec![proof],
    }];
    let resolved = resolve_log(&created.log, Some(&proofs), None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::WitnessQuorum(_))));
}

// Malformed witness configurations are rejected when building.
#[tokio::test]
async fn witness_shape_rejected() {
    let bad_configs = [
        Witness {
            threshold: 0,
            witnesses: vec![WitnessWeight {
                id: "did:key:z6MkA".to_string(),
                weight: None,
            }],
        },
        Witness {
            threshold: 1,
            witnesses: vec![],
        },
        Witness {
            threshold: 5,
            witnesses: vec![WitnessWeight {
                id: "did:key:z6MkA".to_string(),
                weight: Some(1),
            }],
        },
        Witness {
            threshold: 1,
            witnesses: vec![WitnessWeight {
                id: "not-a-did".to_string(),
                weight: Some(1),
            }],
        },
    ];

    for witness in bad_configs {
        let result = CreateBuilder::new().witness(&witness);
        assert!(matches!(result, Err(Error::InvalidInput(_))), "{witness:?} should be rejected");
    }
}

// A tampered proof value invalidates the entry.
#[tokio::test]
async fn tampered_proof_rejected() {
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
    let other = Keyring::new();
    let forged = log[0].proof(&other).await.expect("should create proof");
    log[0].proof = vec![forged];

    let resolved = resolve_log(&log, None, None, &Ed25519Verifier).await;
    assert!(matches!(resolved, Err(Error::Unauthorized(_))));
}

// A log survives the JSONL codec byte-for-byte.
#[tokio::test]
async fn jsonl_round_trip() {
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

    let text = to_jsonl(&created.log).expect("should serialize");
    let parsed = parse_jsonl(&text).expect("should parse");
    assert_eq!(parsed, created.log);

    let resolved =
        resolve_log(&parsed, None, None, &Ed25519Verifier).await.expect("should resolve log");
    assert_eq!(resolved.document, created.document);
}
