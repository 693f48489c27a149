//! Fixture quirk modules for the `hid-bpf-harness` end-to-end tests.
//!
//! `build.rs` compiles every `modules/<name>.c` with the test wrapper into
//! [`MODULE_DIR`]; the tests under `tests/` point a
//! [`ModuleCache`](hid_bpf_harness::ModuleCache) at it.

/// Directory holding `libtest-<name>.so` and `libtest-<name>.json` for every
/// fixture module.
pub const MODULE_DIR: &str = concat!(env!("OUT_DIR"), "/modules");
