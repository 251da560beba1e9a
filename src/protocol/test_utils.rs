//! Test helpers shared by the primitive and record-batch codec tests.

macro_rules! test_roundtrip {
    ($t:ty, $name:ident) => {
        proptest::proptest! {
            #![proptest_config(proptest::prelude::ProptestConfig{fork: false, ..Default::default()})]
            #[test]
            fn $name(orig: $t) {
                use crate::protocol::traits::{ReadType, WriteType};

                let mut buf = Vec::new();
                orig.write(&mut buf).unwrap();

                let restored = <$t>::read(&mut std::io::Cursor::new(buf)).unwrap();
                assert_eq!(orig, restored);
            }
        }
    };
}

pub(crate) use test_roundtrip;
