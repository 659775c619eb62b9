#![no_main]

use libfuzzer_sys::fuzz_target;
use wildgram::config::PresearchConfig;
use wildgram::extract::AnchorExtractor;
use wildgram::pattern::Pattern;

fuzz_target!(|data: &str| {
    // Parsing may fail but must not panic, and any anchor must be a
    // literal run of the pattern
    let extractor = AnchorExtractor::from_config(&PresearchConfig::default());
    for pattern in [Pattern::parse_wildcard(data), Pattern::parse_regex(data)] {
        let Ok(pattern) = pattern else { continue };
        if let Ok(Some(term)) = extractor.extract_anchor(&pattern, "body") {
            let body = term.anchor_body(extractor.marker());
            assert!(pattern.literal_runs().iter().any(|run| run.text == body));
        }
    }
    let _ = wildgram::query::parse_query(data, "body");
});
