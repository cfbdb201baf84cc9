mod common;

use common::strategies::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use study_router::routing::{
    evaluate, evaluate_named, InstanceSelector, Operator, RankingMetric, Rule, RuleAction,
    RuleDefinition, SendMode,
};
use study_router::{ResourceRef, TagMap};

fn rule_from(conditions: &BTreeMap<String, String>) -> Rule {
    Rule::compile(&RuleDefinition {
        name: "generated".to_string(),
        conditions: conditions.clone(),
        action: RuleAction {
            send_mode: SendMode::StudyWhole,
            destinations: vec!["PACS".to_string()],
        },
    })
    .expect("generated rule should compile")
}

proptest! {
    /// Property: evaluation is total and unknown operators never match
    #[test]
    fn evaluate_named_is_total_and_fails_closed(
        operator in operator_name_strategy(),
        actual in prop::option::of(".{0,24}"),
        expected in ".{0,24}",
    ) {
        let result = evaluate_named(&operator, actual.as_deref(), &expected);
        if operator.parse::<Operator>().is_err() {
            prop_assert!(!result);
        }
    }

    /// Property: negated operators are exact complements
    #[test]
    fn negated_operators_are_complements(
        actual in prop::option::of(tag_value_strategy()),
        expected in tag_value_strategy(),
    ) {
        let actual = actual.as_deref();
        prop_assert_eq!(
            evaluate(Operator::Equals, actual, &expected),
            !evaluate(Operator::NotEquals, actual, &expected)
        );
        prop_assert_eq!(
            evaluate(Operator::Contains, actual, &expected),
            !evaluate(Operator::NotContains, actual, &expected)
        );
    }

    /// Property: case never changes the outcome for ASCII values
    #[test]
    fn evaluation_ignores_case(
        operator in operator_strategy(),
        actual in tag_value_strategy(),
        expected in tag_value_strategy(),
    ) {
        prop_assert_eq!(
            evaluate(operator, Some(&actual.to_uppercase()), &expected.to_lowercase()),
            evaluate(operator, Some(&actual), &expected)
        );
    }

    /// Property: an absent value behaves exactly like an empty one
    #[test]
    fn absent_value_reads_as_empty(
        operator in operator_strategy(),
        expected in tag_value_strategy(),
    ) {
        prop_assert_eq!(
            evaluate(operator, None, &expected),
            evaluate(operator, Some(""), &expected)
        );
    }

    /// Property: dropping a clause from a matching rule keeps it matching
    #[test]
    fn removing_a_clause_keeps_a_match(
        description in tag_value_strategy(),
        patient in tag_value_strategy(),
        institution in tag_value_strategy(),
        drop_index in 0usize..3,
    ) {
        let study = TagMap::new()
            .with("StudyDescription", description.clone())
            .with("PatientName", patient.clone())
            .with("InstitutionName", institution.clone());

        let mut conditions = BTreeMap::new();
        conditions.insert("study_description_equals".to_string(), description);
        conditions.insert("patient_name_contains".to_string(), patient);
        conditions.insert("institution_name_equals".to_string(), institution);
        prop_assert!(rule_from(&conditions).matches(&study, None));

        let key = conditions.keys().nth(drop_index).cloned().unwrap();
        conditions.remove(&key);
        prop_assert!(rule_from(&conditions).matches(&study, None));
    }

    /// Property: a single failing clause sinks the whole rule
    #[test]
    fn one_failing_clause_fails_the_rule(
        description in tag_value_strategy(),
    ) {
        let study = TagMap::new().with("StudyDescription", description.clone());

        let mut conditions = BTreeMap::new();
        conditions.insert("study_description_equals".to_string(), description.clone());
        conditions.insert("study_description_not_equals".to_string(), description);
        prop_assert!(!rule_from(&conditions).matches(&study, None));
    }

    /// Property: selection returns the first instance with the largest pixel area
    #[test]
    fn selector_picks_first_maximum(resolutions in resolution_list_strategy()) {
        let instances: Vec<(ResourceRef, TagMap)> = resolutions
            .iter()
            .enumerate()
            .map(|(index, (rows, columns))| {
                (
                    ResourceRef::instance(format!("inst-{index}")),
                    TagMap::new()
                        .with("Rows", rows.to_string())
                        .with("Columns", columns.to_string()),
                )
            })
            .collect();

        let selection = InstanceSelector::new(RankingMetric::PixelArea)
            .select_best(instances.iter().map(|(instance, tags)| (instance, Some(tags))))
            .expect("non-empty candidates with tags always select");

        let areas: Vec<u64> = resolutions
            .iter()
            .map(|(rows, columns)| u64::from(*rows) * u64::from(*columns))
            .collect();
        let best = areas.iter().copied().max().unwrap();
        let first_best = areas.iter().position(|area| *area == best).unwrap();

        prop_assert_eq!(selection.score, best);
        prop_assert_eq!(&selection.instance.id, &format!("inst-{first_best}"));
    }

    /// Property: unparseable dimensions score zero and never panic
    #[test]
    fn dimension_parsing_is_total(rows in dimension_strategy(), columns in dimension_strategy()) {
        let tags = TagMap::new().with("Rows", rows.clone()).with("Columns", columns.clone());
        let score = RankingMetric::PixelArea.score(&tags);

        match (rows.parse::<u64>(), columns.parse::<u64>()) {
            (Ok(r), Ok(c)) => prop_assert_eq!(score, r * c),
            _ => prop_assert_eq!(score, 0),
        }
    }
}

#[test]
fn test_documented_resolution_example_selects_b() {
    let a = ResourceRef::instance("A");
    let b = ResourceRef::instance("B");
    let c = ResourceRef::instance("C");
    let tags = |side: u32| {
        TagMap::new()
            .with("Rows", side.to_string())
            .with("Columns", side.to_string())
    };
    let (ta, tb, tc) = (tags(512), tags(1024), tags(256));

    let selection = InstanceSelector::default()
        .select_best([(&a, Some(&ta)), (&b, Some(&tb)), (&c, Some(&tc))])
        .unwrap();
    assert_eq!(selection.instance, &b);
}
