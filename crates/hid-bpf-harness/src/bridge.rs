//! Kernel service stand-ins installed into a module around each call.
//!
//! A compiled test module reaches the harness only through the
//! [`CallbackTable`] it received last via `set_callbacks`. The module keeps
//! that table in a single static, so the harness installs a fresh one before
//! every invocation and a disarmed one afterwards. The table's data pointer
//! must never outlive the buffer it aliases.
//!
//! The stubs are plain `extern "C"` functions; the per-call state they work
//! on (tracked contexts, recorded hardware requests, configured replies)
//! lives in a thread local. Native code calls back synchronously on the
//! invoking thread, and invocations on one module are serialized by the
//! module's lock.

use std::cell::RefCell;
use std::ffi::{c_int, c_uint};
use std::marker::PhantomData;
use std::ptr;

use hid_bpf_abi::{
    CallbackTable, ExecutionContext, HID_MAX_BUFFER_SIZE, ReportType, RequestKind, SetCallbacksFn,
    errno,
};

thread_local! {
    static ACTIVE: RefCell<Option<BridgeState>> = const { RefCell::new(None) };
}

/// One `hid_bpf_hw_request()` issued by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwRequestRecord {
    /// Index of the context the request went through, when the harness
    /// allocated that context.
    pub hid: Option<u32>,
    /// Raw report type argument.
    pub raw_report_type: c_int,
    /// Raw class request argument.
    pub raw_request_kind: c_int,
    /// Request buffer as the module filled it in.
    pub data: Vec<u8>,
}

impl HwRequestRecord {
    /// Decoded report type.
    pub fn report_type(&self) -> Option<ReportType> {
        ReportType::from_raw(self.raw_report_type)
    }

    /// Decoded class request.
    pub fn request_kind(&self) -> Option<RequestKind> {
        RequestKind::from_raw(self.raw_request_kind)
    }
}

/// How the hardware request stub answers.
#[derive(Debug, Clone, Default)]
pub(crate) struct StubBehavior {
    pub(crate) hw_request_result: i32,
    pub(crate) hw_request_reply: Option<Vec<u8>>,
}

/// What the module did through the bridge during one call.
#[derive(Debug, Default)]
pub(crate) struct BridgeReport {
    pub(crate) hw_requests: Vec<HwRequestRecord>,
    pub(crate) leaked_contexts: usize,
}

struct BridgeState {
    contexts: Vec<*mut ExecutionContext>,
    hw_requests: Vec<HwRequestRecord>,
    behavior: StubBehavior,
}

impl BridgeState {
    fn new(behavior: StubBehavior) -> Self {
        Self {
            contexts: Vec::new(),
            hw_requests: Vec::new(),
            behavior,
        }
    }

    fn into_report(self) -> BridgeReport {
        let leaked_contexts = self.contexts.len();
        for ctx in self.contexts {
            // SAFETY: tracked pointers come from Box::into_raw in the
            // allocate stub and are removed from the list when released.
            drop(unsafe { Box::from_raw(ctx) });
        }
        BridgeReport {
            hw_requests: self.hw_requests,
            leaked_contexts,
        }
    }
}

/// Run `f` on the armed state of this thread.
///
/// Returns `None` when nothing is armed. Never panics: the callers are
/// entered from native code.
fn with_state<R>(f: impl FnOnce(&mut BridgeState) -> R) -> Option<R> {
    ACTIVE
        .try_with(|cell| {
            let mut slot = cell.try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
        .ok()
        .flatten()
}

fn replace_state(state: Option<BridgeState>) -> Option<BridgeState> {
    ACTIVE
        .try_with(|cell| {
            cell.try_borrow_mut()
                .map(|mut slot| std::mem::replace(&mut *slot, state))
                .ok()
                .flatten()
        })
        .ok()
        .flatten()
}

unsafe extern "C" fn allocate_context_stub(hid: c_uint) -> *mut ExecutionContext {
    let allocated_size = u32::try_from(HID_MAX_BUFFER_SIZE).unwrap_or(u32::MAX);
    let ctx = Box::into_raw(Box::new(
        ExecutionContext::for_index(hid).with_allocated_size(allocated_size),
    ));

    if with_state(|state| state.contexts.push(ctx)).is_some() {
        return ctx;
    }

    tracing::warn!(hid, "Context requested outside of an invocation");
    // SAFETY: ctx was created by Box::into_raw above and never handed out.
    drop(unsafe { Box::from_raw(ctx) });
    ptr::null_mut()
}

unsafe extern "C" fn release_context_stub(ctx: *mut ExecutionContext) {
    if ctx.is_null() {
        return;
    }

    let tracked = with_state(|state| {
        let position = state.contexts.iter().position(|&owned| owned == ctx);
        position.map(|index| state.contexts.swap_remove(index))
    })
    .flatten();

    let Some(owned) = tracked else {
        tracing::warn!(?ctx, "Ignoring release of a context the harness did not allocate");
        return;
    };
    // SAFETY: the pointer was tracked, so it came from Box::into_raw in the
    // allocate stub and has just been untracked.
    drop(unsafe { Box::from_raw(owned) });
}

unsafe extern "C" fn hw_request_stub(
    ctx: *mut ExecutionContext,
    data: *mut u8,
    len: usize,
    report_type: c_int,
    request_kind: c_int,
) -> c_int {
    let buffer: &mut [u8] = if data.is_null() || len == 0 {
        &mut []
    } else {
        // SAFETY: hid_bpf_hw_request() requires `data` to be valid for
        // `len` bytes for the duration of the call.
        unsafe { std::slice::from_raw_parts_mut(data, len) }
    };

    let result = with_state(|state| {
        let hid = if state.contexts.contains(&ctx) {
            // SAFETY: a tracked context is a live allocation owned by the
            // bridge.
            Some(unsafe { (*ctx).index })
        } else {
            None
        };

        state.hw_requests.push(HwRequestRecord {
            hid,
            raw_report_type: report_type,
            raw_request_kind: request_kind,
            data: buffer.to_vec(),
        });

        match &state.behavior.hw_request_reply {
            Some(reply) => {
                let copied = reply.len().min(buffer.len());
                if let (Some(dst), Some(src)) = (buffer.get_mut(..copied), reply.get(..copied)) {
                    dst.copy_from_slice(src);
                }
                c_int::try_from(copied).unwrap_or(c_int::MAX)
            }
            None => state.behavior.hw_request_result,
        }
    });

    result.unwrap_or_else(|| {
        tracing::warn!(report_type, request_kind, "Hardware request outside of an invocation");
        -errno::EIO
    })
}

/// Table with every stub wired and no data buffer.
pub(crate) fn disarmed_table() -> CallbackTable {
    CallbackTable {
        allocate_context: Some(allocate_context_stub),
        release_context: Some(release_context_stub),
        hw_request: Some(hw_request_stub),
        data: ptr::null_mut(),
        data_len: 0,
    }
}

/// Callback table installed into a module for the duration of one call.
///
/// Holds the borrow of the aliased buffer, so the buffer cannot be touched
/// or dropped from Rust while the module may still write to it. Disarming
/// (explicitly or on drop) installs [`disarmed_table`] and frees every
/// context the module forgot to release.
pub(crate) struct ArmedBridge<'buf> {
    set_callbacks: SetCallbacksFn,
    armed: bool,
    _buffer: PhantomData<&'buf mut [u8]>,
}

impl<'buf> ArmedBridge<'buf> {
    /// Install a table aliasing `buffer` into the module.
    ///
    /// # Safety
    ///
    /// `set_callbacks` must be the `set_callbacks` entry point of a loaded
    /// module that copies the table it is given.
    pub(crate) unsafe fn arm(
        set_callbacks: SetCallbacksFn,
        buffer: Option<&'buf mut [u8]>,
        behavior: StubBehavior,
    ) -> Self {
        if replace_state(Some(BridgeState::new(behavior))).is_some() {
            tracing::warn!("Replacing a bridge that was still armed on this thread");
        }

        let mut table = disarmed_table();
        if let Some(buffer) = buffer {
            table.data = buffer.as_mut_ptr();
            table.data_len = buffer.len();
        }

        // SAFETY: guaranteed by the caller; the table outlives the call and
        // is copied by the module.
        unsafe { set_callbacks(&table) };

        Self {
            set_callbacks,
            armed: true,
            _buffer: PhantomData,
        }
    }

    /// Detach the buffer and collect what the module did.
    pub(crate) fn disarm(mut self) -> BridgeReport {
        self.teardown()
    }

    fn teardown(&mut self) -> BridgeReport {
        if !self.armed {
            return BridgeReport::default();
        }
        self.armed = false;

        let table = disarmed_table();
        // SAFETY: same entry point the bridge was armed with, see `arm`.
        unsafe { (self.set_callbacks)(&table) };

        let report = replace_state(None)
            .map(BridgeState::into_report)
            .unwrap_or_default();
        if report.leaked_contexts > 0 {
            tracing::warn!(
                leaked = report.leaked_contexts,
                "Module did not release every context it allocated"
            );
        }
        report
    }
}

impl Drop for ArmedBridge<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}
