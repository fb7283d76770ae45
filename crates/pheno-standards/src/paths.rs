//! Definition directory resolution.

use std::path::PathBuf;

/// Environment variable for overriding the definition directory.
pub const DEFINITIONS_ENV_VAR: &str = "PHENO_DEFINITIONS_DIR";

/// Get the phenotype definition directory.
///
/// Resolution order:
/// 1. `PHENO_DEFINITIONS_DIR` environment variable
/// 2. `phenotypes/ukbiobank/` relative to workspace root
pub fn definitions_root() -> PathBuf {
    if let Ok(root) = std::env::var(DEFINITIONS_ENV_VAR) {
        return PathBuf::from(root);
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../phenotypes/ukbiobank")
}
