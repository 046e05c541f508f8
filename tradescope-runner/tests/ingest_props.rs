//! Property tests for report ingestion.

use proptest::prelude::*;
use tradescope_runner::ingest::{parse_number, parse_timestamp, DEFAULT_ENCODINGS};
use tradescope_runner::{parse_trades, IngestOutcome};

fn default_labels() -> Vec<String> {
    DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect()
}

proptest! {
    /// Arbitrary bytes never panic; a failure records one attempt per encoding.
    #[test]
    fn arbitrary_bytes_yield_an_outcome(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        match parse_trades(&bytes, &default_labels()) {
            IngestOutcome::Success(loaded) => prop_assert!(DEFAULT_ENCODINGS.contains(&loaded.encoding.as_str())),
            IngestOutcome::Failure { attempted } => prop_assert_eq!(attempted.len(), DEFAULT_ENCODINGS.len()),
        }
    }

    /// Thousands separators do not change the parsed value.
    #[test]
    fn separators_are_ignored(whole in 0u64..10_000_000, cents in 0u32..100) {
        let plain = format!("{whole}.{cents:02}");
        let mut grouped = String::new();
        let digits = whole.to_string();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        grouped.push_str(&format!(".{cents:02}"));
        prop_assert_eq!(parse_number(&grouped), parse_number(&plain));
    }

    /// Slash and dash date layouts parse to the same instant.
    #[test]
    fn date_layouts_agree(y in 2000i32..2040, m in 1u32..=12, d in 1u32..=28, h in 0u32..24, min in 0u32..60) {
        let dash = format!("{y:04}-{m:02}-{d:02} {h:02}:{min:02}:00");
        let slash = format!("{y:04}/{m:02}/{d:02} {h:02}:{min:02}:00");
        let parsed = parse_timestamp(&dash);
        prop_assert!(parsed.is_some());
        prop_assert_eq!(parsed, parse_timestamp(&slash));
    }
}
