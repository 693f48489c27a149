//! Property-based tests for the invocation wrappers.

#![cfg(unix)]

mod common;

use hid_bpf_harness::prelude::*;
use proptest::prelude::*;

use common::{module, mouse_report, mouse_y};

fn descriptor_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..HID_MAX_BUFFER_SIZE)
}

fn report_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..128)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_rdesc_is_zero_padded(rdesc in descriptor_strategy()) {
        let noop = module("0010-noop");
        let fixed = match noop.fixup_report_descriptor(Some(rdesc.as_slice())) {
            Ok(Some(fixed)) => fixed,
            other => return Err(TestCaseError::fail(format!("unexpected result: {other:?}"))),
        };
        prop_assert_eq!(fixed.len(), HID_MAX_BUFFER_SIZE);
        prop_assert_eq!(&fixed[..rdesc.len()], rdesc.as_slice());
        prop_assert!(fixed[rdesc.len()..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn prop_event_length_is_preserved(report in report_strategy()) {
        for name in ["0010-noop", "0010-mouse_invert_y", "0010-XPPen__DecoMini4"] {
            let fixed = match module(name).fixup_device_event(Some(report.as_slice())) {
                Ok(Some(fixed)) => fixed,
                other => {
                    return Err(TestCaseError::fail(format!("{name}: unexpected result: {other:?}")));
                }
            };
            prop_assert_eq!(fixed.len(), report.len(), "{}", name);
        }
    }

    #[test]
    fn prop_probe_leaves_caller_args_untouched(
        rdesc in prop::collection::vec(any::<u8>(), 0..512),
        hid in any::<u32>(),
    ) {
        let raptor = module("0010-FR-TEC__Raptor-Mach-2");
        let original = ProbeArgs::new(&rdesc)
            .ok_or_else(|| TestCaseError::fail("descriptor fits the buffer"))?
            .with_hid(hid);
        let snapshot = original;

        let probed = match raptor.probe(&original) {
            Ok(probed) => probed,
            Err(err) => return Err(TestCaseError::fail(err.to_string())),
        };
        prop_assert_eq!(original, snapshot);
        prop_assert_eq!(probed.hid, hid);
        prop_assert_eq!(probed.descriptor(), original.descriptor());
        prop_assert!(probed.retval == 0 || probed.retval == -errno::EINVAL);
    }

    #[test]
    fn prop_rdesc_fixup_is_idempotent(rdesc in descriptor_strategy()) {
        let rapoo = module("0010-Rapoo__M50-Plus-Silent");
        let first = rapoo.fixup_report_descriptor(Some(rdesc.as_slice()));
        let second = rapoo.fixup_report_descriptor(Some(rdesc.as_slice()));
        prop_assert!(first.is_ok());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_mouse_y_is_negated(y in (i16::MIN + 1)..=i16::MAX) {
        let mouse = module("0010-mouse_invert_y");
        let fixed = match mouse.fixup_device_event(Some(mouse_report(y).as_slice())) {
            Ok(Some(fixed)) => fixed,
            other => return Err(TestCaseError::fail(format!("unexpected result: {other:?}"))),
        };
        prop_assert_eq!(mouse_y(&fixed), -y);
    }
}
