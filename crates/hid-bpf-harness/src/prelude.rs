//! Convenience re-exports for writing module tests.

pub use crate::error::{HarnessError, InvocationError, LoadError};
pub use crate::loader::{ModuleCache, load, load_or_abort};
pub use crate::metadata::Role;
pub use crate::module::{Invocation, InvokeOptions, Operation, TestModule};
pub use crate::{HarnessConfig, HwRequestRecord};

pub use hid_bpf_abi::{
    ExecutionContext, HID_MAX_BUFFER_SIZE, ProbeArgs, ReportType, RequestKind, errno,
};
