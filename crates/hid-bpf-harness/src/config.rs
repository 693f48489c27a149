//! Search path and artifact naming configuration.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Environment variable holding the test module search path.
pub const SEARCH_PATH_ENV: &str = "HID_BPF_TEST_PATH";

/// Consulted when [`SEARCH_PATH_ENV`] is unset or empty.
pub const FALLBACK_SEARCH_PATH_ENV: &str = "LD_LIBRARY_PATH";

/// File name prefix of compiled test modules.
pub const DEFAULT_ARTIFACT_PREFIX: &str = "libtest-";

/// Extension of the companion program metadata document.
pub const METADATA_EXTENSION: &str = "json";

/// Harness configuration.
///
/// ```
/// use hid_bpf_harness::HarnessConfig;
///
/// let config = HarnessConfig::default().with_search_dir("builddir/test");
/// assert_eq!(
///     config.metadata_file_name("0010-mouse_invert_y"),
///     "libtest-0010-mouse_invert_y.json"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directories searched in order for artifacts and their metadata.
    pub search_path: Vec<PathBuf>,
    /// Prefix prepended to the logical module name.
    pub artifact_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            search_path: Vec::new(),
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
        }
    }
}

/// Where a module's artifact and metadata live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// Shared object to open. A bare file name defers to the system loader.
    pub library: PathBuf,
    /// Companion metadata document; may not exist.
    pub metadata: PathBuf,
}

impl HarnessConfig {
    /// Configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var_os(key))
    }

    /// Configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let raw = lookup(SEARCH_PATH_ENV)
            .filter(|value| !value.is_empty())
            .or_else(|| lookup(FALLBACK_SEARCH_PATH_ENV));

        let search_path = raw
            .map(|value| {
                env::split_paths(&value)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            search_path,
            ..Self::default()
        }
    }

    /// Append a directory to the search path.
    #[must_use]
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_path.push(dir.into());
        self
    }

    /// Replace the artifact prefix.
    #[must_use]
    pub fn with_artifact_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artifact_prefix = prefix.into();
        self
    }

    /// Shared object file name for a logical module name.
    pub fn artifact_file_name(&self, name: &str) -> String {
        format!("{}{}{}", self.artifact_prefix, name, env::consts::DLL_SUFFIX)
    }

    /// Metadata document file name for a logical module name.
    pub fn metadata_file_name(&self, name: &str) -> String {
        format!("{}{}.{}", self.artifact_prefix, name, METADATA_EXTENSION)
    }

    /// Find the artifact for `name` on the search path.
    pub fn locate(&self, name: &str) -> Result<ArtifactLocation, LoadError> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(LoadError::InvalidName {
                name: name.to_string(),
            });
        }

        let artifact = self.artifact_file_name(name);
        let metadata = self.metadata_file_name(name);

        if self.search_path.is_empty() {
            return Ok(ArtifactLocation {
                library: PathBuf::from(artifact),
                metadata: PathBuf::from(metadata),
            });
        }

        self.search_path
            .iter()
            .map(|dir| dir.join(&artifact))
            .find(|candidate| candidate.is_file())
            .map(|library| ArtifactLocation {
                metadata: library
                    .parent()
                    .map_or_else(|| PathBuf::from(&metadata), |dir| dir.join(&metadata)),
                library,
            })
            .ok_or_else(|| LoadError::ArtifactNotFound {
                artifact,
                searched: self.searched(),
            })
    }

    fn searched(&self) -> String {
        self.search_path
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }
}
