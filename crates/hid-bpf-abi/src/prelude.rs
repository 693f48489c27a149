//! Convenience re-exports for common ABI types.
//!
//! # Example
//!
//! ```
//! use hid_bpf_abi::prelude::*;
//!
//! let mut args = ProbeArgs::default().with_rdesc_size(232);
//! args.rdesc[177] = 0xEF;
//! assert_eq!(args.descriptor().len(), 232);
//! assert_eq!(args.rdesc.len(), HID_MAX_BUFFER_SIZE);
//! ```

pub use crate::constants::{HID_MAX_BUFFER_SIZE, errno, mandatory_symbol, section_suffix};

pub use crate::types::{
    AllocateContextFn, CallbackTable, ExecutionContext, HookFn, HwRequestFn, ProbeArgs, ProbeFn,
    ReleaseContextFn, ReportType, RequestKind, SetCallbacksFn,
};
