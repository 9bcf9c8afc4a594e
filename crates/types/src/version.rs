//! Node version compatibility.

use crate::error::{TypesError, TypesResult};
use semver::Version;

/// The version this node advertises in every envelope header.
pub const NODE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a node version string.
pub fn parse_version(version: &str) -> TypesResult<Version> {
    Version::parse(version).map_err(|e| TypesError::InvalidVersion(version.to_string(), e.to_string()))
}

/// Check that a remote node version can talk to the local node.
///
/// Versions are compatible when their major components match.
pub fn check_version_compatible(local: &str, remote: &str) -> TypesResult<()> {
    let local_version = parse_version(local)?;
    let remote_version = parse_version(remote)?;
    ensure!(
        local_version.major == remote_version.major,
        TypesError::IncompatibleVersion { local: local.to_string(), remote: remote.to_string() }
    );
    Ok(())
}

/// Returns `true` if the remote version is compatible with [NODE_VERSION].
pub fn is_compatible_with_local(remote: &str) -> bool {
    check_version_compatible(NODE_VERSION, remote).is_ok()
}
