//! Node version compatibility.

use assert_matches::assert_matches;
use dn_types::{check_version_compatible, is_compatible_with_local, TypesError, NODE_VERSION};

#[test]
fn test_same_major_is_compatible() {
    assert!(check_version_compatible("0.1.0", "0.1.1").is_ok());
    assert!(check_version_compatible("0.1.0", "0.9.3").is_ok());
    assert!(check_version_compatible("2.0.0", "2.4.1").is_ok());
}

#[test]
fn test_major_mismatch_is_incompatible() {
    let err = check_version_compatible("0.1.0", "1.1.1").unwrap_err();
    assert_matches!(err, TypesError::IncompatibleVersion { .. });
}

#[test]
fn test_garbage_version_is_rejected() {
    let err = check_version_compatible("0.1.0", "not a version").unwrap_err();
    assert_matches!(err, TypesError::InvalidVersion(v, _) if v == "not a version");
    assert!(!is_compatible_with_local(""));
}

#[test]
fn test_local_version_is_compatible_with_itself() {
    assert!(is_compatible_with_local(NODE_VERSION));
}
