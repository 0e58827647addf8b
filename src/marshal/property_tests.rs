//! 封送层属性测试
//!
//! 使用proptest覆盖转换与句柄解析的不变式

#[cfg(test)]
mod tests {
    use crate::marshal::args::probe::Probe;
    use crate::marshal::args::{check_length, check_types, ArgKind, ArgSignature};
    use crate::marshal::liveness::oracle::SetOracle;
    use crate::marshal::liveness::{resolve_handle_to_object, Resolved};
    use crate::marshal::name::NameTable;
    use crate::marshal::tagger::{HandleTable, NativePtr};
    use crate::marshal::value::{decode_file_content, DecodePolicy, NativeString};
    use proptest::prelude::*;

    fn native_ptr() -> impl Strategy<Value = NativePtr> {
        (1u64..u64::MAX).prop_map(|addr| NativePtr::new(addr).unwrap())
    }

    proptest! {
        #[test]
        fn utf16_round_trip(text in any::<String>()) {
            let native = NativeString::from(text.as_str());
            prop_assert_eq!(native.to_utf8(DecodePolicy::Strict).unwrap(), text);
        }

        #[test]
        fn utf8_with_bom_decodes_to_body(text in any::<String>()) {
            let mut bytes = vec![0xEF, 0xBB, 0xBF];
            bytes.extend_from_slice(text.as_bytes());
            prop_assert_eq!(decode_file_content(&bytes, DecodePolicy::Strict).unwrap(), text);
        }

        #[test]
        fn utf16_le_with_bom_decodes_to_body(text in any::<String>()) {
            let mut bytes = vec![0xFF, 0xFE];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            prop_assert_eq!(decode_file_content(&bytes, DecodePolicy::Strict).unwrap(), text);
        }

        #[test]
        fn lossy_decode_never_fails(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert!(decode_file_content(&bytes, DecodePolicy::Lossy).is_ok());
        }

        #[test]
        fn name_display_round_trips(base in "[A-Za-z][A-Za-z0-9]{0,12}", suffix in proptest::option::of(0u32..100_000)) {
            let text = match suffix {
                Some(n) => format!("{}_{}", base, n),
                None => base.clone(),
            };
            let mut names = NameTable::new();
            let name = names.intern(&text).unwrap();
            let shown = names.display(name).unwrap();
            prop_assert_eq!(&shown, &text);
            prop_assert_eq!(names.intern(&shown).unwrap(), name);
        }

        #[test]
        fn fetch_returns_attached_until_released(ptr in native_ptr(), index in 0usize..4) {
            let mut table = HandleTable::new(4);
            let handle = table.create_handle().unwrap();
            table.attach(handle, ptr, index).unwrap();

            let mut oracle = SetOracle::default();
            oracle.valid.insert(ptr);
            prop_assert_eq!(table.fetch(Some(handle), index), Some(ptr));
            prop_assert_eq!(resolve_handle_to_object(&table, Some(handle), index, &oracle), Resolved::Live(ptr));

            oracle.valid.remove(&ptr);
            let resolved = resolve_handle_to_object(&table, Some(handle), index, &oracle);
            prop_assert_eq!(resolved, Resolved::Released);
            prop_assert_eq!(resolve_handle_to_object(&table, Some(handle), index, &oracle), resolved);
        }

        #[test]
        fn short_calls_always_fail(expected in 1usize..8, missing in 1usize..8) {
            let provided = expected.saturating_sub(missing);
            prop_assume!(provided < expected);
            let err = check_length(provided, expected).unwrap_err();
            let msg = err.to_string();
            prop_assert!(msg.contains(&expected.to_string()));
            prop_assert!(msg.contains(&provided.to_string()));
        }

        #[test]
        fn non_integral_number_fails_int32(value in -1.0e6f64..1.0e6) {
            prop_assume!(value.fract() != 0.0);
            let sig = ArgSignature::from([ArgKind::Int32]);
            prop_assert!(check_types(&[Probe::Float(value)], &sig).is_err());
        }
    }
}
