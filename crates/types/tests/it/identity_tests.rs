//! Identifier parsing and display.

use assert_matches::assert_matches;
use dn_types::{AccountId, DocumentId, TypesError};
use std::str::FromStr as _;

#[test]
fn test_account_id_hex_roundtrip() {
    let account = AccountId::new([7; 32]);
    let displayed = account.to_string();
    assert!(displayed.starts_with("0x"));
    assert_eq!(AccountId::from_str(&displayed).unwrap(), account);

    // protocol ids embed the identity without a prefix
    assert_eq!(AccountId::from_str(&account.to_hex()).unwrap(), account);
}

#[test]
fn test_identifier_rejects_wrong_length() {
    let err = DocumentId::from_str("0xabcd").unwrap_err();
    assert_matches!(err, TypesError::InvalidIdentifierLength { expected: 32, actual: 2 });

    let err = AccountId::try_from_slice(&[1; 33]).unwrap_err();
    assert_matches!(err, TypesError::InvalidIdentifierLength { expected: 32, actual: 33 });
}

#[test]
fn test_identifier_rejects_bad_hex() {
    let err = AccountId::from_str("not-hex").unwrap_err();
    assert_matches!(err, TypesError::InvalidHex(_));
}

#[test]
fn test_identifier_bcs() {
    let id = DocumentId::new([42; 32]);
    let bytes = dn_types::encode(&id).unwrap();
    // fixed arrays encode without a length prefix
    assert_eq!(bytes.len(), 32);
    let decoded: DocumentId = dn_types::try_decode(&bytes).unwrap();
    assert_eq!(decoded, id);
}
