//! Subscriber installation is process-wide, so it gets its own test binary.

use confab::logging::{LogFormat, init_tracing};

#[test]
fn second_init_is_harmless() {
    assert!(init_tracing(LogFormat::Text).is_ok());
    assert!(init_tracing(LogFormat::Json).is_ok());
    tracing::info!(target: "confab", "subscriber installed");
}
