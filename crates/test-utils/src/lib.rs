//! Test fixtures shared across the workspace.
//!
//! In-memory versions of the collaborator services and a simple document model.

mod account;
pub use account::*;
mod document;
pub use document::*;
mod services;
pub use services::*;

/// Install a tracing subscriber for tests.
///
/// Filters with `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Current unix timestamp in seconds.
pub fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
