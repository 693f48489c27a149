//! Sizes, symbol names and return codes fixed by the HID-BPF test ABI.

/// Size of the report descriptor buffer in `struct hid_bpf_probe_args`.
///
/// This is also the size of the buffer handed to a report-descriptor fixup
/// hook, whatever the length of the descriptor it carries.
pub const HID_MAX_BUFFER_SIZE: usize = 4096;

/// Symbols every compiled test module exports.
pub mod mandatory_symbol {
    /// `int probe(struct hid_bpf_probe_args *ctx)`
    pub const PROBE: &str = "probe";
    /// `void set_callbacks(struct test_callbacks *cb)`
    pub const SET_CALLBACKS: &str = "set_callbacks";
}

/// Suffixes of the program section tags that identify a hook role.
///
/// Matched against the end of the section name so both the struct_ops
/// (`struct_ops/hid_rdesc_fixup`) and the older tracing
/// (`fmod_ret/hid_bpf_rdesc_fixup`) spellings are recognized.
pub mod section_suffix {
    /// Report descriptor fixup hook.
    pub const RDESC_FIXUP: &str = "rdesc_fixup";
    /// Device event hook.
    pub const DEVICE_EVENT: &str = "device_event";
}

/// Kernel errno values modules report as negative return codes.
pub mod errno {
    /// Operation not permitted
    pub const EPERM: i32 = 1;
    /// I/O error
    pub const EIO: i32 = 5;
    /// Out of memory
    pub const ENOMEM: i32 = 12;
    /// Invalid argument, the usual "device not matched" probe result
    pub const EINVAL: i32 = 22;
}
