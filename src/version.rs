//! Version information with embedded build metadata.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Target triple the crate was built for, or "unknown" if unavailable.
pub const TARGET_TRIPLE: &str = match option_env!("VERGEN_CARGO_TARGET_TRIPLE") {
    Some(triple) => triple,
    None => "unknown",
};

/// Build timestamp (RFC 3339), or "unknown" if unavailable.
pub const BUILD_TIMESTAMP: &str = match option_env!("VERGEN_BUILD_TIMESTAMP") {
    Some(ts) => ts,
    None => "unknown",
};

/// Full version string: `{version} ({target}, built {timestamp})`.
///
/// Example: `0.1.0 (x86_64-unknown-linux-gnu, built 2026-10-19T08:12:45Z)`
pub fn version_string() -> String {
    format!("{PKG_VERSION} ({TARGET_TRIPLE}, built {BUILD_TIMESTAMP})")
}
