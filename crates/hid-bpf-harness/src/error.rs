//! Error types for loading and invoking test modules.

use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::Role;
use crate::module::Operation;

/// Hint appended to every load failure.
pub const SEARCH_PATH_HINT: &str = "Maybe export HID_BPF_TEST_PATH=builddir/test";

/// Top-level harness error.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The module could not be loaded. Nothing can be asserted without it.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A native entry point failed or could not be called.
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Error type for module loading.
///
/// A load error means the test run is misconfigured; see
/// [`crate::ModuleCache::load_or_abort`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The logical module name cannot form an artifact file name.
    #[error("Invalid test module name {name:?}: must be non-empty and contain no path separator")]
    InvalidName {
        /// Rejected name.
        name: String,
    },

    /// No directory on the search path contains the artifact.
    #[error("Unable to find {artifact} in [{searched}]. {}", SEARCH_PATH_HINT)]
    ArtifactNotFound {
        /// Artifact file name.
        artifact: String,
        /// Directories searched, colon separated.
        searched: String,
    },

    /// The dynamic loader refused the artifact.
    #[error("Error loading the library {artifact}: {reason}. {}", SEARCH_PATH_HINT)]
    LibraryLoadFailed {
        /// Artifact path or file name.
        artifact: String,
        /// Loader diagnostic.
        reason: String,
    },

    /// A symbol every test module exports is absent.
    #[error("{artifact} does not export `{symbol}`: {reason}")]
    MissingSymbol {
        /// Artifact path or file name.
        artifact: String,
        /// Missing symbol.
        symbol: String,
        /// Loader diagnostic.
        reason: String,
    },
}

/// Error type for entry point invocation.
///
/// These are ordinary test failures: a test may assert on them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The native entry point returned non-zero.
    #[error("{operation} of {module} returned {code}")]
    ReturnCode {
        /// Logical module name.
        module: String,
        /// Entry point invoked.
        operation: Operation,
        /// Native return code.
        code: i32,
    },

    /// The module exposes no usable entry point for the role.
    #[error("{module} has no {role} entry point: {reason}")]
    UnresolvedRole {
        /// Logical module name.
        module: String,
        /// Requested role.
        role: Role,
        /// Why discovery did not bind the role.
        reason: String,
    },

    /// The report descriptor does not fit the fixed-size buffer.
    #[error("Report descriptor of {len} bytes exceeds the {max} byte buffer")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
        /// Buffer size.
        max: usize,
    },
}

impl InvocationError {
    /// Native return code, if the failure came from the module.
    pub fn code(&self) -> Option<i32> {
        match self {
            InvocationError::ReturnCode { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Error reading a companion metadata document.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The document could not be read.
    #[error("Unable to read {path}: {source}")]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not a valid program list.
    #[error("Malformed program metadata in {path}: {source}")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_errors_carry_remediation() {
        let err = LoadError::ArtifactNotFound {
            artifact: "libtest-foo.so".to_string(),
            searched: "/nowhere".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("libtest-foo.so"));
        assert!(msg.contains("HID_BPF_TEST_PATH"));

        let err = LoadError::LibraryLoadFailed {
            artifact: "libtest-foo.so".to_string(),
            reason: "cannot open shared object file".to_string(),
        };
        assert!(err.to_string().contains("HID_BPF_TEST_PATH"));
    }

    #[test]
    fn test_return_code_display_and_code() {
        let err = InvocationError::ReturnCode {
            module: "0010-failing".to_string(),
            operation: Operation::ReportDescriptorFixup,
            code: -5,
        };
        assert_eq!(err.code(), Some(-5));
        assert_eq!(
            err.to_string(),
            "hid_rdesc_fixup of 0010-failing returned -5"
        );
    }

    #[test]
    fn test_non_native_errors_have_no_code() {
        let err = InvocationError::PayloadTooLarge { len: 5000, max: 4096 };
        assert_eq!(err.code(), None);

        let err = InvocationError::UnresolvedRole {
            module: "m".to_string(),
            role: Role::DeviceEvent,
            reason: "no metadata".to_string(),
        };
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("hid_device_event"));
    }

    #[test]
    fn test_harness_error_from() {
        let err: HarnessError = LoadError::InvalidName {
            name: String::new(),
        }
        .into();
        assert!(matches!(err, HarnessError::Load(_)));

        let err: HarnessError = InvocationError::PayloadTooLarge { len: 1, max: 0 }.into();
        assert!(matches!(err, HarnessError::Invocation(_)));
    }
}
