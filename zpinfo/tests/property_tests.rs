//! Property-based tests for option parsing and JSON formatting.

use proptest::prelude::*;
use serde_json::Value;
use zpinfo::{Error, JsonFormatter, Options};

// ============================================================================
// Strategies
// ============================================================================

/// Arbitrary JSON values, nested a few levels deep.
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-zA-Z]{1,8}", inner), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect())),
        ]
    })
}

fn parse_timeout(timeout: &str) -> Result<Options, clap::Error> {
    Options::try_parse_from(["zpinfo", "--timeout", timeout, "192.168.1.50"])
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn timeout_in_range_is_preserved(timeout in 1u64..=60) {
        let options = parse_timeout(&timeout.to_string()).unwrap();
        prop_assert_eq!(options.timeout, timeout);
    }

    #[test]
    fn timeout_above_range_is_a_usage_error(timeout in 61u64..100_000) {
        let error = Error::Usage(parse_timeout(&timeout.to_string()).unwrap_err());
        prop_assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn negative_timeout_is_a_usage_error(timeout in 1i64..100_000) {
        let arg = format!("--timeout=-{timeout}");
        let error = Options::try_parse_from(["zpinfo", arg.as_str(), "192.168.1.50"]).unwrap_err();
        prop_assert_ne!(error.exit_code(), 0);
    }

    #[test]
    fn pretty_and_compact_decode_to_the_same_value(value in json_strategy()) {
        let pretty = JsonFormatter::new(false).format(&value).unwrap();
        let compact = JsonFormatter::new(true).format(&value).unwrap();

        prop_assert!(!compact.contains('\n'));
        let from_pretty: Value = serde_json::from_str(&pretty).unwrap();
        let from_compact: Value = serde_json::from_str(&compact).unwrap();
        prop_assert_eq!(&from_pretty, &value);
        prop_assert_eq!(&from_compact, &value);
    }
}

#[test]
fn timeout_zero_is_a_usage_error() {
    assert!(parse_timeout("0").is_err());
}
