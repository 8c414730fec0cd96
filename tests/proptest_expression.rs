//! Property tests for expression encoding and query parsing

mod generators;

use daf::expression::{decode_expression, encode_expression};
use daf::parse_query;
use proptest::prelude::*;

/// A well-formed query text, with irregular spacing.
fn arb_query_text() -> impl Strategy<Value = String> {
    let mask = prop_oneof![
        Just(String::new()),
        (generators::arb_name(), 0i32..100).prop_map(|(vector, value)| format!(" : {vector} > {value}")),
        generators::arb_name().prop_map(|vector| format!(":~{vector}")),
    ];
    let stage = prop_oneof![
        Just(String::new()),
        Just("%Abs".to_string()),
        Just(" %> Sum".to_string()),
        (1u8..10).prop_map(|base| format!(" % Log;base={base}")),
        Just("% Clamp; min = -1; max = Inf %> Mean".to_string()),
    ];
    (generators::arb_name(), mask, generators::arb_name(), stage)
        .prop_map(|(axis, mask, property, stage)| format!("{axis}{mask} @ {property}{stage}"))
}

proptest! {
    /// Decoding undoes encoding for any text
    #[test]
    fn decode_inverts_encode(text in generators::arb_expression_text()) {
        prop_assert_eq!(decode_expression(&encode_expression(&text)), text);
    }

    /// Encoded text only has underscores as markers
    #[test]
    fn encoded_underscores_are_markers(text in generators::arb_expression_text()) {
        let encoded = encode_expression(&text);
        for (index, _) in encoded.match_indices('_') {
            let digits = encoded.get(index + 1..index + 3).unwrap_or("");
            prop_assert!(digits.len() == 2 && digits.bytes().all(|byte| byte.is_ascii_hexdigit()), "{}", encoded);
        }
    }

    /// Parsing arbitrary text returns rather than panics
    #[test]
    fn parse_never_panics(text in "[a-z0-9 :@,;%>=<!~&|.\\\\-]{0,40}") {
        let _ = parse_query(&text);
    }

    /// The canonical rendering parses back to the same query, and renders the same
    #[test]
    fn canonical_rendering_is_stable(text in arb_query_text()) {
        let parsed = parse_query(&text).unwrap();
        let canonical = parsed.to_string();
        let reparsed = parse_query(&canonical).unwrap();
        prop_assert_eq!(&reparsed, &parsed);
        prop_assert_eq!(reparsed.to_string(), canonical);
    }
}
