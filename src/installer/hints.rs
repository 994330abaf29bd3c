//! One-line remediation hints for common install failures.

/// (case-insensitive pattern, hint). First match wins.
const HINTS: &[(&str, &str)] = &[
    (
        "externally-managed-environment",
        "The target is a system interpreter; install into an envkit environment instead",
    ),
    (
        "microsoft visual c++",
        "A C/C++ compiler is required: install the Visual C++ Build Tools",
    ),
    (
        "command 'gcc' failed",
        "A C compiler is required: install build-essential (Debian/Ubuntu), base-devel (Arch) or Xcode CLT (macOS)",
    ),
    (
        "unable to execute 'gcc'",
        "A C compiler is required: install build-essential (Debian/Ubuntu), base-devel (Arch) or Xcode CLT (macOS)",
    ),
    (
        "python.h: no such file",
        "Python development headers are missing: install python3-dev (or python3-devel)",
    ),
    (
        "can't find rust compiler",
        "This package builds Rust extensions: install a Rust toolchain from https://rustup.rs",
    ),
    (
        "pg_config executable not found",
        "PostgreSQL client headers are missing: install libpq-dev, or use psycopg2-binary",
    ),
    (
        "no matching distribution found",
        "No build exists for this Python version or platform; check the package name and supported versions",
    ),
    (
        "could not find a version that satisfies",
        "No build exists for this Python version or platform; check the package name and supported versions",
    ),
    (
        "temporary failure in name resolution",
        "Network lookup failed: check your internet connection or proxy settings",
    ),
    (
        "connectionerror",
        "Network error talking to the package index: check connectivity or proxy settings",
    ),
    (
        "read timed out",
        "The package index timed out: retry later or configure a closer mirror",
    ),
    (
        "permission denied",
        "Permission denied: check ownership of the environment directory",
    ),
    (
        "no space left on device",
        "Disk is full: free space and retry",
    ),
];

/// Hint for a failure's diagnostic text, if it matches a known pattern
pub fn failure_hint(diagnostics: &str) -> Option<&'static str> {
    let lower = diagnostics.to_lowercase();
    HINTS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, hint)| *hint)
}
