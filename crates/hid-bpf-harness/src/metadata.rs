//! Companion program metadata and hook roles.
//!
//! BPF programs get their entry point names from the source file, so the
//! harness cannot know them up front. The build writes a JSON document next
//! to each artifact listing its program sections:
//!
//! ```json
//! { "programs": [
//!     { "section": "struct_ops/hid_device_event", "name": "hid_y_event" },
//!     { "section": "syscall", "name": "probe" }
//! ] }
//! ```
//!
//! A bare array of the same records is accepted too.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use hid_bpf_abi::section_suffix;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Hook kinds a module may expose under a generated symbol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Rewrites the report descriptor before the device is bound.
    ReportDescriptorFixup,
    /// Rewrites each input report.
    DeviceEvent,
}

impl Role {
    /// Every role, in discovery order.
    pub const ALL: [Role; 2] = [Role::ReportDescriptorFixup, Role::DeviceEvent];

    /// Role of a program section, if it is one of the known hooks.
    pub fn from_section(section: &str) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| section.ends_with(role.section_suffix()))
    }

    /// Section tag suffix identifying this role.
    pub fn section_suffix(self) -> &'static str {
        match self {
            Role::ReportDescriptorFixup => section_suffix::RDESC_FIXUP,
            Role::DeviceEvent => section_suffix::DEVICE_EVENT,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::ReportDescriptorFixup => f.write_str("hid_rdesc_fixup"),
            Role::DeviceEvent => f.write_str("hid_device_event"),
        }
    }
}

/// One exported program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    /// ELF section tag, e.g. `struct_ops/hid_rdesc_fixup`.
    pub section: String,
    /// Exported symbol implementing the program.
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Wrapped { programs: Vec<ProgramRecord> },
    Bare(Vec<ProgramRecord>),
}

/// Parsed companion metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleMetadata {
    programs: Vec<ProgramRecord>,
}

impl ModuleMetadata {
    /// Parse a metadata document.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let programs = match serde_json::from_str(json)? {
            Document::Wrapped { programs } | Document::Bare(programs) => programs,
        };
        Ok(Self { programs })
    }

    /// Read and parse a metadata document.
    pub fn read(path: &Path) -> Result<Self, MetadataError> {
        let json = fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&json).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All listed programs.
    pub fn programs(&self) -> &[ProgramRecord] {
        &self.programs
    }

    /// Symbol bound to each role. The first program listed for a role wins.
    pub fn symbols_by_role(&self) -> HashMap<Role, &str> {
        let mut symbols = HashMap::new();
        for program in &self.programs {
            let Some(role) = Role::from_section(&program.section) else {
                continue;
            };
            if let Some(bound) = symbols.get(&role) {
                tracing::warn!(
                    %role,
                    bound,
                    ignored = %program.name,
                    "Duplicate program for role in module metadata"
                );
                continue;
            }
            symbols.insert(role, program.name.as_str());
        }
        symbols
    }
}
