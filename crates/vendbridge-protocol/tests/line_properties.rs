//! Property tests for line framing and classification.
//!
//! Run with: cargo test --package vendbridge-protocol --test line_properties

use bytes::BytesMut;
use proptest::prelude::*;
use tokio_util::codec::Decoder;
use vendbridge_protocol::{InboundLine, LineCodec};

proptest! {
    /// Any printable uid survives framing and classification unchanged.
    #[test]
    fn card_uid_round_trips_through_codec(uid in "[0-9A-F]{4,20}") {
        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(format!("CARDUID:{uid}\r\n").as_bytes());

        let line = codec.decode(&mut buffer).unwrap().unwrap();
        prop_assert_eq!(InboundLine::parse(&line), InboundLine::CardUid(uid));
    }

    /// Arbitrary bytes never make the decoder fail, and every emitted line
    /// is non-empty, trimmed and free of terminators.
    #[test]
    fn decoder_never_fails_on_noise(noise in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut codec = LineCodec::with_max_length(64);
        let mut buffer = BytesMut::from(&noise[..]);

        while let Some(line) = codec.decode(&mut buffer).unwrap() {
            prop_assert!(!line.is_empty());
            prop_assert_eq!(line.trim(), line.as_str());
            prop_assert!(!line.contains('\n'));
            prop_assert!(line.len() <= 64);
        }
    }

    /// Splitting the input at any point yields the same lines.
    #[test]
    fn chunk_boundaries_do_not_change_output(split in 0usize..40) {
        let input = b"SYSTEM:Ready\nCARDUID:DEADBEEF\nCOMPLETE:pad\n";
        let split = split.min(input.len());

        let mut codec = LineCodec::new();
        let mut buffer = BytesMut::from(&input[..split]);
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(&mut buffer).unwrap() {
            lines.push(line);
        }
        buffer.extend_from_slice(&input[split..]);
        while let Some(line) = codec.decode(&mut buffer).unwrap() {
            lines.push(line);
        }

        prop_assert_eq!(lines, vec!["SYSTEM:Ready", "CARDUID:DEADBEEF", "COMPLETE:pad"]);
    }

    /// Classification never panics and only yields a card event for the
    /// exact `CARDUID:` prefix with a non-empty payload.
    #[test]
    fn parse_is_total(line in ".{0,80}") {
        if let InboundLine::CardUid(uid) = InboundLine::parse(&line) {
            prop_assert!(line.trim().starts_with("CARDUID:"));
            prop_assert!(!uid.is_empty());
        }
    }
}
