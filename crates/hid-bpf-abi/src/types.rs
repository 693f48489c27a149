//! ABI type definitions for compiled test modules.
//!
//! Every structure here is passed by pointer into native code. Nothing in
//! this module dereferences those pointers; that is the harness's job.

use core::ffi::{c_int, c_uint, c_void};
use core::fmt;

use crate::constants::HID_MAX_BUFFER_SIZE;

/// Argument of the `probe` entry point, mirrors `struct hid_bpf_probe_args`.
///
/// `rdesc` is always the full [`HID_MAX_BUFFER_SIZE`] bytes. Bytes past
/// `rdesc_size` are whatever the caller put there (zero by default) and are
/// handed to the module untouched.
///
/// # Memory Layout
///
/// | Offset | Size | Field      |
/// |--------|------|------------|
/// | 0      | 4    | hid        |
/// | 4      | 4    | rdesc_size |
/// | 8      | 4096 | rdesc      |
/// | 4104   | 4    | retval     |
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ProbeArgs {
    /// HID device id (the `NNNN` in `0003:04D9:A09F.NNNN`)
    pub hid: c_uint,
    /// Declared length of the report descriptor in `rdesc`
    pub rdesc_size: c_uint,
    /// Report descriptor bytes, zero padded
    pub rdesc: [u8; HID_MAX_BUFFER_SIZE],
    /// Probe verdict written by the module: 0 to bind, negative errno otherwise
    pub retval: c_int,
}

impl Default for ProbeArgs {
    fn default() -> Self {
        Self {
            hid: 0,
            rdesc_size: 0,
            rdesc: [0; HID_MAX_BUFFER_SIZE],
            retval: 0,
        }
    }
}

impl ProbeArgs {
    /// Build probe arguments carrying `rdesc`.
    ///
    /// Returns `None` if `rdesc` does not fit in [`HID_MAX_BUFFER_SIZE`]
    /// bytes, the same limit the report descriptor fixup enforces.
    #[must_use]
    pub fn new(rdesc: &[u8]) -> Option<Self> {
        let mut args = Self::default();
        args.rdesc.get_mut(..rdesc.len())?.copy_from_slice(rdesc);
        args.rdesc_size = c_uint::try_from(rdesc.len()).ok()?;
        Some(args)
    }

    /// Set the declared descriptor size without touching the buffer.
    #[must_use]
    pub fn with_rdesc_size(mut self, rdesc_size: c_uint) -> Self {
        self.rdesc_size = rdesc_size;
        self
    }

    /// Set the HID device id.
    #[must_use]
    pub fn with_hid(mut self, hid: c_uint) -> Self {
        self.hid = hid;
        self
    }

    /// The declared part of the descriptor, clamped to the buffer.
    #[must_use]
    pub fn descriptor(&self) -> &[u8] {
        let len = usize::try_from(self.rdesc_size)
            .unwrap_or(HID_MAX_BUFFER_SIZE)
            .min(HID_MAX_BUFFER_SIZE);
        self.rdesc.get(..len).unwrap_or(&[])
    }

    /// Whether the module accepted the device.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.retval == 0
    }
}

impl fmt::Debug for ProbeArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeArgs")
            .field("hid", &self.hid)
            .field("rdesc_size", &self.rdesc_size)
            .field("rdesc", &format_args!("{:02x?}", self.descriptor()))
            .field("retval", &self.retval)
            .finish()
    }
}

static_assertions::const_assert_eq!(core::mem::size_of::<ProbeArgs>(), 4108);
static_assertions::const_assert_eq!(core::mem::align_of::<ProbeArgs>(), 4);

/// Execution context of a hook, mirrors `struct hid_bpf_ctx`.
///
/// # Memory Layout (64-bit)
///
/// | Offset | Size | Field          |
/// |--------|------|----------------|
/// | 0      | 4    | index          |
/// | 4      | 4    | (padding)      |
/// | 8      | 8    | hid            |
/// | 16     | 4    | allocated_size |
/// | 20     | 4    | report_type    |
/// | 24     | 4    | retval_or_size |
/// | 28     | 4    | (padding)      |
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Program slot index
    pub index: u32,
    /// Opaque `struct hid_device *`, unused by the tests
    pub hid: *mut c_void,
    /// Size of the data buffer backing this context
    pub allocated_size: u32,
    /// Raw [`ReportType`] of the report being processed
    pub report_type: c_int,
    /// Return value, or the report size for device events
    pub retval_or_size: i32,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            index: 0,
            hid: core::ptr::null_mut(),
            allocated_size: 0,
            report_type: ReportType::Input.as_raw(),
            retval_or_size: 0,
        }
    }
}

impl ExecutionContext {
    /// Context for the given slot index.
    #[must_use]
    pub fn for_index(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Set the report type.
    #[must_use]
    pub fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type.as_raw();
        self
    }

    /// Set the allocated buffer size.
    #[must_use]
    pub fn with_allocated_size(mut self, allocated_size: u32) -> Self {
        self.allocated_size = allocated_size;
        self
    }
}

#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(core::mem::size_of::<ExecutionContext>(), 32);
#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(core::mem::align_of::<ExecutionContext>(), 8);

/// `int probe(struct hid_bpf_probe_args *ctx)`
pub type ProbeFn = unsafe extern "C" fn(args: *mut ProbeArgs) -> c_int;

/// `void set_callbacks(struct test_callbacks *cb)`; the module copies the table.
pub type SetCallbacksFn = unsafe extern "C" fn(callbacks: *const CallbackTable);

/// Report descriptor fixup or device event hook.
pub type HookFn = unsafe extern "C" fn(ctx: *mut ExecutionContext) -> c_int;

/// `hid_bpf_allocate_context(hid)` stand-in.
pub type AllocateContextFn = unsafe extern "C" fn(hid: c_uint) -> *mut ExecutionContext;

/// `hid_bpf_release_context(ctx)` stand-in.
pub type ReleaseContextFn = unsafe extern "C" fn(ctx: *mut ExecutionContext);

/// `hid_bpf_hw_request(ctx, data, len, type, reqtype)` stand-in.
pub type HwRequestFn = unsafe extern "C" fn(
    ctx: *mut ExecutionContext,
    data: *mut u8,
    len: usize,
    report_type: c_int,
    request_kind: c_int,
) -> c_int;

/// Kernel services table, mirrors `struct test_callbacks`.
///
/// `data`/`data_len` back `hid_bpf_get_data()`: a request for
/// `offset + size` bytes succeeds only if it fits inside `data_len`.
/// A null `data` with zero length makes every request fail, which is what
/// the kernel does when no buffer is attached.
///
/// # Memory Layout (64-bit)
///
/// | Offset | Size | Field            |
/// |--------|------|------------------|
/// | 0      | 8    | allocate_context |
/// | 8      | 8    | release_context  |
/// | 16     | 8    | hw_request       |
/// | 24     | 8    | data             |
/// | 32     | 8    | data_len         |
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CallbackTable {
    /// Context allocation service
    pub allocate_context: Option<AllocateContextFn>,
    /// Context release service
    pub release_context: Option<ReleaseContextFn>,
    /// Hardware request service
    pub hw_request: Option<HwRequestFn>,
    /// Buffer returned by `hid_bpf_get_data()`
    pub data: *mut u8,
    /// Length of `data` in bytes
    pub data_len: usize,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self {
            allocate_context: None,
            release_context: None,
            hw_request: None,
            data: core::ptr::null_mut(),
            data_len: 0,
        }
    }
}

impl CallbackTable {
    /// Whether a data buffer is attached.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_null() && self.data_len > 0
    }
}

static_assertions::const_assert_eq!(
    core::mem::size_of::<Option<HwRequestFn>>(),
    core::mem::size_of::<*const c_void>()
);
#[cfg(target_pointer_width = "64")]
static_assertions::const_assert_eq!(core::mem::size_of::<CallbackTable>(), 40);

/// HID report type, `enum hid_report_type`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReportType {
    /// `HID_INPUT_REPORT`
    Input = 0,
    /// `HID_OUTPUT_REPORT`
    Output = 1,
    /// `HID_FEATURE_REPORT`
    Feature = 2,
}

impl ReportType {
    /// Raw value passed across the ABI.
    #[must_use]
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Decode a raw value.
    #[must_use]
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0 => Some(Self::Input),
            1 => Some(Self::Output),
            2 => Some(Self::Feature),
            _ => None,
        }
    }
}

/// HID class request, `enum hid_class_request`.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestKind {
    /// `HID_REQ_GET_REPORT`
    GetReport = 0x01,
    /// `HID_REQ_GET_IDLE`
    GetIdle = 0x02,
    /// `HID_REQ_GET_PROTOCOL`
    GetProtocol = 0x03,
    /// `HID_REQ_SET_REPORT`
    SetReport = 0x09,
    /// `HID_REQ_SET_IDLE`
    SetIdle = 0x0A,
    /// `HID_REQ_SET_PROTOCOL`
    SetProtocol = 0x0B,
}

impl RequestKind {
    /// Raw value passed across the ABI.
    #[must_use]
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Decode a raw value.
    #[must_use]
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            0x01 => Some(Self::GetReport),
            0x02 => Some(Self::GetIdle),
            0x03 => Some(Self::GetProtocol),
            0x09 => Some(Self::SetReport),
            0x0A => Some(Self::SetIdle),
            0x0B => Some(Self::SetProtocol),
            _ => None,
        }
    }
}
