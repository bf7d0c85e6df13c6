//! Vendors the C runtime every generated program links against: the ARC
//! primitives (`ember_string_*`, `ember_array_*`, `ember_hash_*`) and the
//! boxed-value machinery behind them, described in full in the project's
//! design notes.
//!
//! The runtime ships as a single header, embedded into this binary with
//! `include_str!` so `emberc` never depends on a runtime file existing on
//! disk at the install location — [`write_to`] materializes it next to
//! generated output at compile time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The C source of `ember_runtime.h`.
pub const RUNTIME_HEADER: &str = include_str!("runtime.h");

/// The filename generated code expects to `#include`.
pub const RUNTIME_HEADER_NAME: &str = "ember_runtime.h";

/// Writes the runtime header into `dir`, creating the directory if
/// necessary, and returns the path written.
pub fn write_to(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(RUNTIME_HEADER_NAME);
    fs::write(&path, RUNTIME_HEADER)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_declares_the_core_types() {
        assert!(RUNTIME_HEADER.contains("EmberString"));
        assert!(RUNTIME_HEADER.contains("EmberArray"));
        assert!(RUNTIME_HEADER.contains("EmberHash"));
        assert!(RUNTIME_HEADER.contains("EmberValue"));
    }

    #[test]
    fn write_to_creates_the_header_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_to(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), RUNTIME_HEADER);
    }
}
