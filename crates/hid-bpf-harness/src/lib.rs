//! Test harness for compiled HID-BPF device-quirk modules.
//!
//! A quirk module is normally loaded into the kernel as a BPF object. For
//! unit testing, the same C source is built as a native shared object linked
//! with a small wrapper that forwards the kernel helpers (`hid_bpf_get_data`,
//! `hid_bpf_allocate_context`, ...) to a callback table. This crate loads
//! such artifacts and drives their three entry points:
//!
//! - `probe`, deciding whether the module applies to a device
//! - the report descriptor fixup hook
//! - the device event hook
//!
//! Hook symbol names are generated per module and discovered from a JSON
//! program list shipped next to the artifact.
//!
//! # Search Path
//!
//! Artifacts are named `libtest-<name>.so` and searched for in the
//! directories listed in `HID_BPF_TEST_PATH`, falling back to
//! `LD_LIBRARY_PATH`, then to the system loader.
//!
//! # Example
//!
//! ```rust,no_run
//! use hid_bpf_harness::{ProbeArgs, load_or_abort};
//!
//! let module = load_or_abort("0010-FR-TEC__Raptor-Mach-2");
//!
//! let mut args = ProbeArgs::default().with_rdesc_size(232);
//! args.rdesc[177] = 0xef;
//! let probed = module.probe(&args)?;
//! assert_eq!(probed.retval, 0);
//!
//! let rdesc = module.fixup_report_descriptor(Some(&[0u8; 4096][..]))?;
//! assert_eq!(rdesc.map(|rdesc| rdesc[177]), Some(0x07));
//! # Ok::<(), hid_bpf_harness::InvocationError>(())
//! ```
//!
//! # Threads
//!
//! `cargo test` runs tests in parallel. The cache is locked, and every call
//! into a module holds a lock keyed by the artifact's canonical path: the
//! module keeps its callback table in a single static, shared by every
//! handle the dynamic loader gives out for that file, whichever cache
//! opened it.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod bridge;

pub mod config;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod module;
pub mod prelude;

pub use bridge::HwRequestRecord;
pub use config::{
    ArtifactLocation, DEFAULT_ARTIFACT_PREFIX, FALLBACK_SEARCH_PATH_ENV, HarnessConfig,
    SEARCH_PATH_ENV,
};
pub use error::{HarnessError, InvocationError, LoadError, MetadataError, SEARCH_PATH_HINT};
pub use loader::{ModuleCache, load, load_or_abort};
pub use metadata::{ModuleMetadata, ProgramRecord, Role};
pub use module::{Invocation, InvokeOptions, Operation, TestModule};

pub use hid_bpf_abi::{
    CallbackTable, ExecutionContext, HID_MAX_BUFFER_SIZE, ProbeArgs, ReportType, RequestKind,
    errno,
};
