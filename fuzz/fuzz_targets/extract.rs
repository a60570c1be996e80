#![no_main]
use libfuzzer_sys::fuzz_target;
use perft_diff::drain::CapturedOutput;
use perft_diff::extract::{extract, trailing_count, ExtractionPolicy};

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let output = CapturedOutput::from(text.as_ref());
    let _ = extract(&output, ExtractionPolicy::Positional);
    if let Ok(nodes) = extract(&output, ExtractionPolicy::Scan) {
        // The count always comes from the end of some line.
        assert!(output
            .lines()
            .iter()
            .any(|line| trailing_count(line) == Some(nodes)));
    }
});
