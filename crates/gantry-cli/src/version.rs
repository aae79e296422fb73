//! Build tool version reporting for automated scripts.

use gantry_core::{Error, Result};

/// Version of the build interface, bumped when flags or output change.
pub const TOOL_VERSION: &[u64] = &[2];

pub fn tool_version_string() -> String {
    TOOL_VERSION
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parse a dotted version like `1.2`.
pub fn parse_version(input: &str) -> Result<Vec<u64>> {
    input
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::VersionParse(input.to_string()))
}

/// Whether the tool version is at least `required`.
///
/// Versions compare component-wise, so `2` satisfies `1.9` and `2` but not `2.0`.
pub fn satisfies(required: &str) -> Result<bool> {
    let required = parse_version(required)?;
    Ok(required.as_slice() <= TOOL_VERSION)
}
