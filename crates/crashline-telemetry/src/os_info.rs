//! Platform facts used as base tags on every crash report
//!
//! Never includes hostname or username.

/// `<os>-<arch>`, e.g. `linux-x86_64`.
pub fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Kernel release, or an empty string if it cannot be read.
pub fn kernel_release() -> String {
    std::fs::read_to_string("/proc/version")
        .ok()
        .and_then(|v| v.split_whitespace().nth(2).map(String::from))
        .unwrap_or_default()
}
