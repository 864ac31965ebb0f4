//! Compile-time version information.

/// Version string of the crate as compiled, in `major.minor.patch` form.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Major version component as a string.
pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");

/// Minor version component as a string.
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");

/// Patch version component as a string.
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");

/// Returns the version string of the crate as compiled.
pub fn version() -> &'static str {
    VERSION
}
