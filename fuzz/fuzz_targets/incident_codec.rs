#![no_main]

use libfuzzer_sys::fuzz_target;
use remedy_core::codec;

fuzz_target!(|data: &[u8]| {
    // 디코딩에 성공한 인시던트는 다시 인코딩/디코딩해도 같아야 함
    if let Ok(incident) = codec::decode(data) {
        let encoded = codec::encode(&incident).expect("decoded incident must encode");
        let again = codec::decode(&encoded).expect("encoded incident must decode");
        assert_eq!(incident, again);
    }
});
