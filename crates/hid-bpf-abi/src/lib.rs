//! C-layout definitions shared between the test harness and compiled
//! HID-BPF device-quirk modules.
//!
//! A quirk module built for testing is a plain shared object: the BPF
//! program sections are compiled as native functions and the kernel
//! services they call (`hid_bpf_get_data`, `hid_bpf_allocate_context`, ...)
//! are forwarded through a callback table the harness installs. This crate
//! defines the three records that cross that boundary:
//!
//! - [`ProbeArgs`] mirrors `struct hid_bpf_probe_args`, the argument of the
//!   `probe` syscall program.
//! - [`ExecutionContext`] mirrors `struct hid_bpf_ctx` as seen by the
//!   report-descriptor and device-event hooks.
//! - [`CallbackTable`] mirrors `struct test_callbacks` from the test
//!   wrapper linked into every module.
//!
//! # ABI Stability
//!
//! All structures are `#[repr(C)]`; field order, sizes and padding match
//! the C declarations exactly. A mismatch does not produce an error, it
//! produces memory corruption inside the module, so the layouts are pinned
//! with compile-time assertions below each type.
//!
//! # Endianness
//!
//! Values are exchanged in host byte order. Report payloads are opaque byte
//! buffers and are never reinterpreted by this crate.

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod constants;
pub mod prelude;
pub mod types;

pub use constants::{HID_MAX_BUFFER_SIZE, errno, mandatory_symbol, section_suffix};
pub use types::{
    AllocateContextFn, CallbackTable, ExecutionContext, HookFn, HwRequestFn, ProbeArgs, ProbeFn,
    ReleaseContextFn, ReportType, RequestKind, SetCallbacksFn,
};
