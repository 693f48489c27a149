//! A loaded test module and its invocation wrappers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use hid_bpf_abi::{
    CallbackTable, ExecutionContext, HID_MAX_BUFFER_SIZE, HookFn, ProbeArgs, ProbeFn,
    SetCallbacksFn, mandatory_symbol,
};
use libloading::Library;
use parking_lot::Mutex;

use crate::bridge::{ArmedBridge, HwRequestRecord, StubBehavior};
use crate::config::HarnessConfig;
use crate::error::{InvocationError, LoadError};
use crate::metadata::{ModuleMetadata, Role};

/// Entry point kinds, as named in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `probe`
    Probe,
    /// Report descriptor fixup hook.
    ReportDescriptorFixup,
    /// Device event hook.
    DeviceEvent,
}

impl From<Role> for Operation {
    fn from(role: Role) -> Self {
        match role {
            Role::ReportDescriptorFixup => Operation::ReportDescriptorFixup,
            Role::DeviceEvent => Operation::DeviceEvent,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Probe => f.write_str(mandatory_symbol::PROBE),
            Operation::ReportDescriptorFixup => write!(f, "{}", Role::ReportDescriptorFixup),
            Operation::DeviceEvent => write!(f, "{}", Role::DeviceEvent),
        }
    }
}

/// Per-call knobs for the `*_with` wrappers.
///
/// ```
/// use hid_bpf_harness::{ExecutionContext, InvokeOptions};
///
/// let options = InvokeOptions::new()
///     .with_context(ExecutionContext::for_index(42))
///     .with_hw_request_reply(vec![0x05, 0x01]);
/// assert_eq!(options.context.map(|ctx| ctx.index), Some(42));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Context handed to the hook. Derived from the payload when unset.
    pub context: Option<ExecutionContext>,
    /// Return value of `hid_bpf_hw_request()` when no reply is configured.
    pub hw_request_result: i32,
    /// Payload copied into the request buffer by `hid_bpf_hw_request()`,
    /// which then returns the number of bytes copied.
    pub hw_request_reply: Option<Vec<u8>>,
}

impl InvokeOptions {
    /// Default options: derived context, hardware requests succeed with 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-supplied execution context.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Make `hid_bpf_hw_request()` return `result`.
    #[must_use]
    pub fn with_hw_request_result(mut self, result: i32) -> Self {
        self.hw_request_result = result;
        self
    }

    /// Make `hid_bpf_hw_request()` answer with `reply`.
    #[must_use]
    pub fn with_hw_request_reply(mut self, reply: Vec<u8>) -> Self {
        self.hw_request_reply = Some(reply);
        self
    }

    fn stub_behavior(&self) -> StubBehavior {
        StubBehavior {
            hw_request_result: self.hw_request_result,
            hw_request_reply: self.hw_request_reply.clone(),
        }
    }
}

/// Outcome of a successful hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The payload buffer after the hook ran, if one was supplied.
    pub data: Option<Vec<u8>>,
    /// The execution context after the hook ran.
    pub context: ExecutionContext,
    /// Hardware requests issued by the hook, in order.
    pub hw_requests: Vec<HwRequestRecord>,
    /// Contexts the hook allocated and never released.
    pub leaked_contexts: usize,
}

enum RoleSlot {
    Resolved { symbol: String, hook: HookFn },
    Unresolved { reason: String },
}

/// A compiled device-quirk module, loaded and resolved.
///
/// Obtained through [`crate::ModuleCache`]. The module keeps its callback
/// table in a static, and every handle opened on the same artifact shares
/// that static, so all entry points are serialized on a lock keyed by the
/// artifact's canonical path rather than by the handle.
pub struct TestModule {
    name: String,
    path: PathBuf,
    probe: ProbeFn,
    set_callbacks: SetCallbacksFn,
    hooks: HashMap<Role, RoleSlot>,
    invoke_lock: Arc<Mutex<()>>,
    _library: Library,
}

impl fmt::Debug for TestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<_> = Role::ALL
            .into_iter()
            .filter(|role| self.has_role(*role))
            .collect();
        f.debug_struct("TestModule")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("roles", &roles)
            .finish_non_exhaustive()
    }
}

/// Invocation lock shared by every handle on the artifact at `path`.
///
/// The dynamic loader hands out one mapping per file, whichever cache opened
/// it, so the lock outlives any single [`TestModule`].
fn library_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut locks = LOCKS.get_or_init(|| Mutex::new(HashMap::new())).lock();
    Arc::clone(locks.entry(key).or_default())
}

/// Copy a symbol's value out of `library`.
///
/// # Safety
///
/// `T` must match the real type of the symbol.
unsafe fn lookup<T: Copy>(library: &Library, symbol: &str) -> Result<T, libloading::Error> {
    // SAFETY: guaranteed by the caller.
    let found = unsafe { library.get::<T>(symbol.as_bytes()) }?;
    Ok(*found)
}

impl TestModule {
    /// Open the artifact for `name` and resolve its entry points.
    pub(crate) fn open(name: &str, config: &HarnessConfig) -> Result<Self, LoadError> {
        let location = config.locate(name)?;
        let artifact = location.library.display().to_string();

        // SAFETY: test modules are plain shared objects without library
        // constructors.
        let library = unsafe { Library::new(&location.library) }.map_err(|e| {
            LoadError::LibraryLoadFailed {
                artifact: artifact.clone(),
                reason: e.to_string(),
            }
        })?;

        let missing = |symbol: &str, e: libloading::Error| LoadError::MissingSymbol {
            artifact: artifact.clone(),
            symbol: symbol.to_string(),
            reason: e.to_string(),
        };

        // SAFETY: `probe` is declared `int probe(struct hid_bpf_probe_args *)`.
        let probe = unsafe { lookup::<ProbeFn>(&library, mandatory_symbol::PROBE) }
            .map_err(|e| missing(mandatory_symbol::PROBE, e))?;
        // SAFETY: `set_callbacks` is declared `void set_callbacks(struct test_callbacks *)`.
        let set_callbacks =
            unsafe { lookup::<SetCallbacksFn>(&library, mandatory_symbol::SET_CALLBACKS) }
                .map_err(|e| missing(mandatory_symbol::SET_CALLBACKS, e))?;

        let hooks = discover_hooks(&library, &location.metadata);
        let invoke_lock = library_lock(&location.library);

        Ok(Self {
            name: name.to_string(),
            path: location.library,
            probe,
            set_callbacks,
            hooks,
            invoke_lock,
            _library: library,
        })
    }

    /// Logical module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the artifact was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an entry point was resolved for `role`.
    pub fn has_role(&self, role: Role) -> bool {
        matches!(self.hooks.get(&role), Some(RoleSlot::Resolved { .. }))
    }

    /// Symbol bound to `role`, if resolved.
    pub fn symbol(&self, role: Role) -> Option<&str> {
        match self.hooks.get(&role) {
            Some(RoleSlot::Resolved { symbol, .. }) => Some(symbol),
            _ => None,
        }
    }

    /// Install a raw callback table.
    ///
    /// Every wrapper installs its own table before calling into the module,
    /// so this only matters to code calling the module's symbols directly.
    ///
    /// # Safety
    ///
    /// The function pointers in `table` must be callable, and `data` must
    /// stay valid for `data_len` bytes, until another table is installed.
    pub unsafe fn set_callbacks(&self, table: &CallbackTable) {
        let _guard = self.invoke_lock.lock();
        // SAFETY: the entry point copies the table; validity of its contents
        // is guaranteed by the caller.
        unsafe { (self.set_callbacks)(table) };
    }

    /// Run `probe` on a copy of `args`.
    ///
    /// The module's verdict is the `retval` of the returned copy; a
    /// rejected device is not an error. `args` itself is never modified.
    pub fn probe(&self, args: &ProbeArgs) -> Result<ProbeArgs, InvocationError> {
        let mut copy = *args;

        let code = {
            let _guard = self.invoke_lock.lock();
            // SAFETY: set_callbacks was resolved from this module.
            let bridge =
                unsafe { ArmedBridge::arm(self.set_callbacks, None, StubBehavior::default()) };
            // SAFETY: `copy` is a live, exclusively borrowed ProbeArgs.
            let code = unsafe { (self.probe)(&mut copy) };
            bridge.disarm();
            code
        };

        tracing::debug!(
            module = %self.name,
            operation = %Operation::Probe,
            code,
            retval = copy.retval,
            "Invoked test module"
        );

        if code != 0 {
            return Err(self.failed(Operation::Probe, code));
        }
        Ok(copy)
    }

    /// Run the report descriptor fixup hook.
    ///
    /// `rdesc` is zero padded to [`HID_MAX_BUFFER_SIZE`] bytes and the whole
    /// buffer is returned. Without a payload the hook runs with no data
    /// attached and `None` is returned.
    pub fn fixup_report_descriptor(
        &self,
        rdesc: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, InvocationError> {
        self.fixup_report_descriptor_with(rdesc, InvokeOptions::default())
            .map(|invocation| invocation.data)
    }

    /// [`fixup_report_descriptor`](Self::fixup_report_descriptor) with
    /// explicit options, returning the full outcome.
    pub fn fixup_report_descriptor_with(
        &self,
        rdesc: Option<&[u8]>,
        options: InvokeOptions,
    ) -> Result<Invocation, InvocationError> {
        let payload = match rdesc {
            Some(rdesc) if rdesc.len() > HID_MAX_BUFFER_SIZE => {
                return Err(InvocationError::PayloadTooLarge {
                    len: rdesc.len(),
                    max: HID_MAX_BUFFER_SIZE,
                });
            }
            Some(rdesc) => {
                let mut buffer = vec![0u8; HID_MAX_BUFFER_SIZE];
                if let Some(head) = buffer.get_mut(..rdesc.len()) {
                    head.copy_from_slice(rdesc);
                }
                Some((buffer, rdesc.len()))
            }
            None => None,
        };

        self.run_hook(Role::ReportDescriptorFixup, payload, options)
    }

    /// Run the device event hook.
    ///
    /// The returned report has exactly the length of `report`.
    pub fn fixup_device_event(
        &self,
        report: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, InvocationError> {
        self.fixup_device_event_with(report, InvokeOptions::default())
            .map(|invocation| invocation.data)
    }

    /// [`fixup_device_event`](Self::fixup_device_event) with explicit
    /// options, returning the full outcome.
    pub fn fixup_device_event_with(
        &self,
        report: Option<&[u8]>,
        options: InvokeOptions,
    ) -> Result<Invocation, InvocationError> {
        let payload = report.map(|report| (report.to_vec(), report.len()));
        self.run_hook(Role::DeviceEvent, payload, options)
    }

    fn hook(&self, role: Role) -> Result<HookFn, InvocationError> {
        match self.hooks.get(&role) {
            Some(RoleSlot::Resolved { hook, .. }) => Ok(*hook),
            Some(RoleSlot::Unresolved { reason }) => Err(InvocationError::UnresolvedRole {
                module: self.name.clone(),
                role,
                reason: reason.clone(),
            }),
            None => Err(InvocationError::UnresolvedRole {
                module: self.name.clone(),
                role,
                reason: "role was never discovered".to_string(),
            }),
        }
    }

    /// Call the hook for `role` over `payload` (buffer, logical size).
    fn run_hook(
        &self,
        role: Role,
        payload: Option<(Vec<u8>, usize)>,
        options: InvokeOptions,
    ) -> Result<Invocation, InvocationError> {
        let hook = self.hook(role)?;
        let behavior = options.stub_behavior();

        let (mut buffer, size) = match payload {
            Some((buffer, size)) => (Some(buffer), size),
            None => (None, 0),
        };
        let mut context = options
            .context
            .unwrap_or_else(|| default_context(buffer.as_ref().map_or(0, Vec::len), size));

        let (code, report) = {
            let _guard = self.invoke_lock.lock();
            // SAFETY: set_callbacks was resolved from this module. The bridge
            // borrows the buffer until it is disarmed.
            let bridge =
                unsafe { ArmedBridge::arm(self.set_callbacks, buffer.as_deref_mut(), behavior) };
            // SAFETY: `hook` was resolved for this role from metadata and
            // `context` is a live, exclusively borrowed context.
            let code = unsafe { hook(&mut context) };
            (code, bridge.disarm())
        };

        let operation = Operation::from(role);
        tracing::debug!(
            module = %self.name,
            %operation,
            code,
            size,
            hw_requests = report.hw_requests.len(),
            "Invoked test module"
        );

        if code != 0 {
            return Err(self.failed(operation, code));
        }

        Ok(Invocation {
            data: buffer,
            context,
            hw_requests: report.hw_requests,
            leaked_contexts: report.leaked_contexts,
        })
    }

    fn failed(&self, operation: Operation, code: i32) -> InvocationError {
        InvocationError::ReturnCode {
            module: self.name.clone(),
            operation,
            code,
        }
    }
}

/// Context the kernel would build for a buffer of `allocated` bytes
/// carrying `size` meaningful bytes.
fn default_context(allocated: usize, size: usize) -> ExecutionContext {
    let mut context = ExecutionContext::default()
        .with_allocated_size(u32::try_from(allocated).unwrap_or(u32::MAX));
    context.retval_or_size = i32::try_from(size).unwrap_or(i32::MAX);
    context
}

fn discover_hooks(library: &Library, metadata_path: &Path) -> HashMap<Role, RoleSlot> {
    let metadata = match ModuleMetadata::read(metadata_path) {
        Ok(metadata) => metadata,
        Err(err) => {
            tracing::debug!(error = %err, "No usable program metadata, hooks unresolved");
            let reason = err.to_string();
            return Role::ALL
                .into_iter()
                .map(|role| (role, RoleSlot::Unresolved { reason: reason.clone() }))
                .collect();
        }
    };

    let symbols = metadata.symbols_by_role();
    Role::ALL
        .into_iter()
        .map(|role| {
            let slot = match symbols.get(&role) {
                None => RoleSlot::Unresolved {
                    reason: format!(
                        "no program section ending in `{}` in {}",
                        role.section_suffix(),
                        metadata_path.display()
                    ),
                },
                // SAFETY: hooks are declared `int hook(struct hid_bpf_ctx *)`.
                Some(symbol) => match unsafe { lookup::<HookFn>(library, symbol) } {
                    Ok(hook) => RoleSlot::Resolved {
                        symbol: (*symbol).to_string(),
                        hook,
                    },
                    Err(e) => RoleSlot::Unresolved {
                        reason: format!("symbol `{symbol}` is not exported: {e}"),
                    },
                },
            };
            (role, slot)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Probe.to_string(), "probe");
        assert_eq!(
            Operation::ReportDescriptorFixup.to_string(),
            "hid_rdesc_fixup"
        );
        assert_eq!(Operation::DeviceEvent.to_string(), "hid_device_event");
    }

    #[test]
    fn test_operation_from_role() {
        assert_eq!(
            Operation::from(Role::ReportDescriptorFixup),
            Operation::ReportDescriptorFixup
        );
        assert_eq!(Operation::from(Role::DeviceEvent), Operation::DeviceEvent);
    }

    #[test]
    fn test_default_context_describes_buffer() {
        let ctx = default_context(HID_MAX_BUFFER_SIZE, 71);
        assert_eq!(ctx.allocated_size as usize, HID_MAX_BUFFER_SIZE);
        assert_eq!(ctx.retval_or_size, 71);
        assert_eq!(ctx.index, 0);

        let ctx = default_context(0, 0);
        assert_eq!(ctx.allocated_size, 0);
        assert_eq!(ctx.retval_or_size, 0);
    }

    #[test]
    fn test_invoke_options_builders() {
        let options = InvokeOptions::new()
            .with_hw_request_result(-5)
            .with_hw_request_reply(vec![1, 2]);
        assert!(options.context.is_none());

        let behavior = options.stub_behavior();
        assert_eq!(behavior.hw_request_result, -5);
        assert_eq!(behavior.hw_request_reply, Some(vec![1, 2]));
    }

    #[test]
    fn test_library_lock_is_shared_per_file() {
        let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
        let direct = library_lock(&manifest.join("Cargo.toml"));
        let dotted = library_lock(&manifest.join("src").join("..").join("Cargo.toml"));
        let other = library_lock(&manifest.join("README.md"));

        assert!(Arc::ptr_eq(&direct, &dotted));
        assert!(!Arc::ptr_eq(&direct, &other));
    }
}
