//! Backup profile stored as TOML.

use anyhow::{bail, Context, Result};
use engine::{ChecksumAlgorithm, RunPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default profile location, relative to the working directory.
pub const DEFAULT_PROFILE_PATH: &str = "backup.toml";

const DEFAULT_PROFILE: &str = r#"# ezbackup profile

# Directory the source trees are mirrored into. Must already exist.
# destination = "/mnt/backup"

# Directories to back up, in order. Each is recreated under the destination
# by its final path segment.
sources = []

# Replace files that already exist in the destination.
overwrite = true

# After copying, compare digests of source and copy (only with overwrite).
verify_hash = false

# Digest used for verification: "sha256" or "blake3".
digest = "sha256"
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub sources: Vec<PathBuf>,
    pub overwrite: bool,
    pub verify_hash: bool,
    pub digest: ChecksumAlgorithm,
}

impl Default for Profile {
    fn default() -> Self {
        let policy = RunPolicy::default();
        Profile {
            destination: None,
            sources: Vec::new(),
            overwrite: policy.overwrite,
            verify_hash: policy.verify_hash,
            digest: policy.digest,
        }
    }
}

impl Profile {
    /// Load a profile; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no profile found, using defaults");
            return Ok(Profile::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse profile {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write profile {}", path.display()))
    }

    /// Write the commented default profile. Refuses to clobber an existing
    /// file unless `force` is set.
    pub fn write_default(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            bail!(
                "Profile {} already exists (use --force to replace it)",
                path.display()
            );
        }
        fs::write(path, DEFAULT_PROFILE)
            .with_context(|| format!("Failed to write profile {}", path.display()))
    }

    pub fn policy(&self) -> RunPolicy {
        RunPolicy {
            overwrite: self.overwrite,
            verify_hash: self.verify_hash,
            digest: self.digest,
        }
    }
}
