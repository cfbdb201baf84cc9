use proptest::prelude::*;
use proptest::strategy::Just;
use study_router::routing::Operator;

/// ASCII tag values, where case folding round-trips
pub fn tag_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ^._-]{0,24}"
}

/// Arbitrary operator names, mostly unknown
pub fn operator_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("contains".to_string()),
        Just("not_contains".to_string()),
        Just("equals".to_string()),
        Just("not_equals".to_string()),
        "[a-z_]{0,16}",
        ".{0,16}",
    ]
}

pub fn operator_strategy() -> impl Strategy<Value = Operator> {
    prop::sample::select(Operator::ALL.to_vec())
}

/// Dimension strings, including values that do not parse
pub fn dimension_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (1u32..4096).prop_map(|value| value.to_string()),
        1 => Just(String::new()),
        1 => "[a-zA-Z]{1,6}",
        1 => Just("-512".to_string()),
    ]
}

/// Non-empty list of (rows, columns) pairs
pub fn resolution_list_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((1u32..4096, 1u32..4096), 1..12)
}
