#![no_main]

use libfuzzer_sys::fuzz_target;
use md_tom::Parser;

fuzz_target!(|data: &[u8]| {
    let input = String::from_utf8_lossy(data);
    let doc = Parser::parse(&input);
    assert!(doc.invariant_violations().is_empty());
    let text = doc.api_text();
    let units = text.text.encode_utf16().count();
    assert!(text.entities.iter().all(|e| e.end() <= units));
    let _ = doc.html();
    let _ = Parser::parse(&doc.markdown());
});
