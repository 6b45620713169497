#![no_main]

use libfuzzer_sys::fuzz_target;
use remedy_executor::StructuredOutput;

fuzz_target!(|data: &[u8]| {
    let _ = StructuredOutput::decode(data);
});
