//! Property-based tests for KLV coding and for parsing untrusted bytes.

use mxfkit::klv::{self, decode_ber_length, encode_ber_length, encode_fixed_ber_length};
use mxfkit::{labels, HeaderMetadata, IndexTableSegment, SystemItemTimecodes};
use proptest::prelude::*;
use std::io::Cursor;

proptest! {
    #[test]
    fn prop_ber_length_round_trip(len in any::<u64>()) {
        let encoded = encode_ber_length(len);
        prop_assert_eq!(encoded.len() as u8, klv::ber_length_size(len));
        prop_assert_eq!(decode_ber_length(&encoded).unwrap(), (len, encoded.len() as u8));
    }

    #[test]
    fn prop_fixed_ber_length(len in 0u64..(1 << 24), llen in 1u8..=9) {
        match encode_fixed_ber_length(len, llen) {
            Ok(encoded) => {
                prop_assert_eq!(encoded.len(), llen as usize);
                prop_assert_eq!(decode_ber_length(&encoded).unwrap(), (len, llen));
            }
            Err(e) => {
                prop_assert!(e.is_malformed_input());
                prop_assert!(llen <= 3);
            }
        }
    }

    #[test]
    fn prop_klv_stream_walk(values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 1..8),
                            fill in 17u64..64) {
        let mut data = Vec::new();
        for value in &values {
            klv::write_kl(&mut data, &labels::SYSTEM_ITEM_SS1, value.len() as u64).unwrap();
            data.extend_from_slice(value);
        }
        klv::write_fill(&mut data, fill).unwrap();

        let mut cursor = Cursor::new(data);
        for value in &values {
            let kl = klv::read_kl(&mut cursor).unwrap();
            prop_assert_eq!(kl.key, labels::SYSTEM_ITEM_SS1);
            prop_assert_eq!(klv::read_value(&mut cursor, kl.len).unwrap(), value.clone());
        }
        let kl = klv::read_kl(&mut cursor).unwrap();
        prop_assert!(kl.key.is_fill_item());
        prop_assert_eq!(kl.total_size(), fill);
    }

    #[test]
    fn prop_untrusted_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = SystemItemTimecodes::decode(&bytes);
        let _ = IndexTableSegment::read(&bytes);
        let _ = klv::read_kl(&mut bytes.as_slice());
        let _ = HeaderMetadata::read(&mut Cursor::new(&bytes), bytes.len() as u64);
    }

    #[test]
    fn prop_primer_bytes_do_not_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut data = Vec::new();
        klv::write_kl(&mut data, &labels::PRIMER_PACK, bytes.len() as u64).unwrap();
        data.extend_from_slice(&bytes);
        let _ = HeaderMetadata::read(&mut Cursor::new(data.clone()), data.len() as u64);
    }
}
