//! Shared fixtures for the harness integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, OnceLock};

use hid_bpf_harness::{HarnessConfig, ModuleCache, TestModule};

pub use hid_bpf_harness_tests::MODULE_DIR;

/// Fresh cache over the fixture modules, independent of [`cache`].
pub fn isolated_cache() -> ModuleCache {
    ModuleCache::new(HarnessConfig::default().with_search_dir(MODULE_DIR))
}

/// Cache over the fixture modules, shared by every test in the binary.
pub fn cache() -> &'static ModuleCache {
    static CACHE: OnceLock<ModuleCache> = OnceLock::new();
    CACHE.get_or_init(|| ModuleCache::new(HarnessConfig::default().with_search_dir(MODULE_DIR)))
}

/// Load a fixture module, failing the test if it is missing.
pub fn module(name: &str) -> Arc<TestModule> {
    cache().load_or_abort(name)
}

/// Compiled artifact of a fixture module.
pub fn artifact_path(name: &str) -> std::path::PathBuf {
    Path::new(MODULE_DIR).join(HarnessConfig::default().artifact_file_name(name))
}

/// Raptor Mach 2 descriptor as far as its probe cares: 232 bytes with the
/// usage maximum at offset 177.
pub fn raptor_rdesc(usage_max: u8) -> Vec<u8> {
    let mut rdesc = vec![0u8; 232];
    rdesc[177] = usage_max;
    rdesc
}

/// 9-byte mouse report with `y` at offset 3, little endian.
pub fn mouse_report(y: i16) -> Vec<u8> {
    let mut report = vec![0u8; 9];
    report[3..5].copy_from_slice(&y.to_le_bytes());
    report
}

/// Read back the `y` written by [`mouse_report`].
pub fn mouse_y(report: &[u8]) -> i16 {
    i16::from_le_bytes([report[3], report[4]])
}
