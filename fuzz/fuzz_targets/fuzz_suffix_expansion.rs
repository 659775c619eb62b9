#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wildgram::analysis::{collapse, expand, DocumentToken, GramKind};
use wildgram::config::{DedupWindow, OffsetUnit, PresearchConfig};

#[derive(Debug, Arbitrary)]
struct Input {
    tokens: Vec<(String, u16)>,
    min_suffix_len: u8,
    max_suffix_len: Option<u8>,
    bytes: bool,
    global: bool,
}

fuzz_target!(|input: Input| {
    let mut config = PresearchConfig::default();
    config.min_suffix_len = usize::from(input.min_suffix_len.max(1));
    config.max_suffix_len = input
        .max_suffix_len
        .map(|max| usize::from(max).max(config.min_suffix_len));
    if input.bytes {
        config.offset_unit = OffsetUnit::Bytes;
    }
    config.dedup_window = if input.global {
        DedupWindow::Global
    } else {
        DedupWindow::Positional
    };

    let tokens: Vec<DocumentToken> = input
        .tokens
        .into_iter()
        .map(|(text, start)| {
            let start = usize::from(start);
            let end = start + text.len();
            DocumentToken::new("body", text, start, end)
        })
        .collect();

    // Every suffix gram ends with the marker and stays inside its token
    for gram in collapse(expand(tokens, &config), config.dedup_window) {
        if gram.kind == GramKind::Suffix {
            assert!(gram.text.ends_with(&config.suffix_marker));
            assert!(gram.start_offset <= gram.end_offset);
        }
    }
});
