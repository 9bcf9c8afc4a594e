//! Consensus signature tests.

use dn_types::{consensus_signature_payload, ed25519, signing_root, AccountId, Signature};

#[test]
fn test_signature_verifies_against_signing_root() {
    let keypair = ed25519::Keypair::generate();
    let signer = AccountId::new([3; 32]);
    let root = signing_root(b"document bytes");

    let signature = Signature::sign(&keypair, signer, &root, true, 1_700_000_000);
    assert_eq!(signature.signer_id, signer);
    assert_eq!(signature.public_key, keypair.public().to_bytes().to_vec());
    assert!(signature.signature_id.starts_with(signer.as_bytes()));
    assert!(signature.verify(&root));

    // different root
    let other = signing_root(b"other document bytes");
    assert!(!signature.verify(&other));
}

#[test]
fn test_signature_binds_transition_flag() {
    let keypair = ed25519::Keypair::generate();
    let root = signing_root(b"document bytes");
    let mut signature = Signature::sign(&keypair, AccountId::new([9; 32]), &root, false, 0);
    assert!(signature.verify(&root));

    signature.transition_validated = true;
    assert!(!signature.verify(&root));
}

#[test]
fn test_signature_payload_layout() {
    let root = vec![1, 2, 3];
    assert_eq!(consensus_signature_payload(&root, true), vec![1, 2, 3, 1]);
    assert_eq!(consensus_signature_payload(&root, false), vec![1, 2, 3, 0]);
}

#[test]
fn test_signature_with_garbage_key_fails() {
    let keypair = ed25519::Keypair::generate();
    let root = signing_root(b"document bytes");
    let mut signature = Signature::sign(&keypair, AccountId::new([9; 32]), &root, true, 0);
    signature.public_key = vec![0; 3];
    assert!(!signature.verify(&root));
}
