//! Property-based tests for ABI helpers.

use hid_bpf_abi::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_probe_args_new_zero_pads(rdesc in proptest::collection::vec(any::<u8>(), 0..HID_MAX_BUFFER_SIZE)) {
        let args = ProbeArgs::new(&rdesc)
            .ok_or_else(|| TestCaseError::fail("descriptor fits the buffer"))?;

        prop_assert_eq!(args.rdesc_size as usize, rdesc.len());
        prop_assert_eq!(args.descriptor(), rdesc.as_slice());
        prop_assert!(args.rdesc.iter().skip(rdesc.len()).all(|&b| b == 0));
    }

    #[test]
    fn prop_probe_args_new_rejects_oversized(extra in 1usize..64) {
        let rdesc = vec![0xa5u8; HID_MAX_BUFFER_SIZE + extra];
        prop_assert!(ProbeArgs::new(&rdesc).is_none());
    }

    #[test]
    fn prop_report_type_raw_decodes(raw in -4i32..8) {
        match ReportType::from_raw(raw) {
            Some(ty) => prop_assert_eq!(ty.as_raw(), raw),
            None => prop_assert!(!(0..=2).contains(&raw)),
        }
    }
}
