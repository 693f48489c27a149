//! Layout tests for the ABI types.
//!
//! These pin the offsets the compiled test wrapper expects. A failure here
//! means every module under test would read garbage.

use std::error::Error;
use std::mem::{align_of, offset_of, size_of};

use hid_bpf_abi::*;
use insta::assert_snapshot;

mod size_and_alignment {
    use super::*;

    #[test]
    fn test_probe_args_size() {
        assert_eq!(size_of::<ProbeArgs>(), 4 + 4 + HID_MAX_BUFFER_SIZE + 4);
        assert_eq!(align_of::<ProbeArgs>(), 4);
    }

    #[test]
    fn test_probe_args_field_offsets() {
        assert_eq!(offset_of!(ProbeArgs, hid), 0);
        assert_eq!(offset_of!(ProbeArgs, rdesc_size), 4);
        assert_eq!(offset_of!(ProbeArgs, rdesc), 8);
        assert_eq!(offset_of!(ProbeArgs, retval), 8 + HID_MAX_BUFFER_SIZE);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_execution_context_field_offsets() {
        assert_eq!(offset_of!(ExecutionContext, index), 0);
        assert_eq!(offset_of!(ExecutionContext, hid), 8);
        assert_eq!(offset_of!(ExecutionContext, allocated_size), 16);
        assert_eq!(offset_of!(ExecutionContext, report_type), 20);
        assert_eq!(offset_of!(ExecutionContext, retval_or_size), 24);
        assert_eq!(size_of::<ExecutionContext>(), 32);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_callback_table_field_offsets() {
        assert_eq!(offset_of!(CallbackTable, allocate_context), 0);
        assert_eq!(offset_of!(CallbackTable, release_context), 8);
        assert_eq!(offset_of!(CallbackTable, hw_request), 16);
        assert_eq!(offset_of!(CallbackTable, data), 24);
        assert_eq!(offset_of!(CallbackTable, data_len), 32);
        assert_eq!(size_of::<CallbackTable>(), 40);
    }

    #[test]
    fn test_nullable_callbacks_are_pointer_sized() {
        assert_eq!(size_of::<Option<AllocateContextFn>>(), size_of::<usize>());
        assert_eq!(size_of::<Option<ReleaseContextFn>>(), size_of::<usize>());
        assert_eq!(size_of::<Option<HwRequestFn>>(), size_of::<usize>());
    }
}

mod probe_args {
    use super::*;

    #[test]
    fn test_copy_is_independent() {
        let original = ProbeArgs::default().with_rdesc_size(232);
        let mut copy = original;
        copy.retval = -errno::EINVAL;
        copy.rdesc[177] = 0x12;
        assert_eq!(original.retval, 0);
        assert_eq!(original.rdesc[177], 0);
    }

    #[test]
    fn test_bytes_past_declared_size_are_kept() -> Result<(), Box<dyn Error>> {
        let mut args = ProbeArgs::new(&[0x05, 0x01]).ok_or("short descriptor rejected")?;
        args.rdesc[100] = 0x42;
        assert_eq!(args.descriptor(), &[0x05, 0x01]);
        assert_eq!(args.rdesc[100], 0x42);
        Ok(())
    }

    #[test]
    fn test_full_buffer_descriptor_is_accepted() -> Result<(), Box<dyn Error>> {
        let rdesc = vec![0x5a; HID_MAX_BUFFER_SIZE];
        let args = ProbeArgs::new(&rdesc).ok_or("full descriptor rejected")?;
        assert_eq!(args.rdesc_size as usize, HID_MAX_BUFFER_SIZE);
        assert!(ProbeArgs::new(&[0; HID_MAX_BUFFER_SIZE + 1]).is_none());
        Ok(())
    }

    #[test]
    fn test_debug_shows_declared_descriptor_only() -> Result<(), Box<dyn Error>> {
        let args = ProbeArgs::new(&[0x05, 0x01])
            .ok_or("short descriptor rejected")?
            .with_hid(7);
        assert_snapshot!(
            format!("{args:?}"),
            @"ProbeArgs { hid: 7, rdesc_size: 2, rdesc: [05, 01], retval: 0 }"
        );
        Ok(())
    }
}

mod constants {
    use super::*;

    #[test]
    fn test_mandatory_symbols() {
        assert_eq!(mandatory_symbol::PROBE, "probe");
        assert_eq!(mandatory_symbol::SET_CALLBACKS, "set_callbacks");
    }

    #[test]
    fn test_errno_values() {
        assert_eq!(errno::EINVAL, 22);
        assert_eq!(errno::EIO, 5);
    }
}
