//! Common test utilities for integration tests.

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary.
///
/// Rerun a failing suite with `RUST_LOG=deskwire=debug` to watch the
/// session loop's decisions; output stays captured per test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
