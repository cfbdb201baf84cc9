//! # Routing Rules
//!
//! Typed rule definitions and the rule matcher.
//!
//! Rules arrive from configuration as a name, a map of `<field>_<operator>` keys
//! to expected values, and an action. [`Rule::compile`] turns each key into a
//! typed [`MatchCondition`] and rejects anything it cannot recognise, so a
//! misspelt field fails at load time instead of silently never matching.

use super::condition::{evaluate, Operator};
use crate::archive::{Granularity, TagMap};
use crate::config::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Where a field's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagScope {
    /// Read from the study's own tags
    Study,
    /// Read from a single instance's tags; never available at study granularity
    Instance,
}

/// Tag categories a rule may match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    StudyDescription,
    PatientName,
    PatientId,
    AccessionNumber,
    ReferringPhysicianName,
    InstitutionName,
    SeriesDescription,
    Manufacturer,
    Modality,
    BodyPartExamined,
    ProtocolName,
    ImageType,
    SopClassUid,
}

impl TagField {
    pub const ALL: [TagField; 13] = [
        TagField::StudyDescription,
        TagField::PatientName,
        TagField::PatientId,
        TagField::AccessionNumber,
        TagField::ReferringPhysicianName,
        TagField::InstitutionName,
        TagField::SeriesDescription,
        TagField::Manufacturer,
        TagField::Modality,
        TagField::BodyPartExamined,
        TagField::ProtocolName,
        TagField::ImageType,
        TagField::SopClassUid,
    ];

    /// Name used as the `<field>` part of a match key
    pub fn config_name(&self) -> &'static str {
        match self {
            Self::StudyDescription => "study_description",
            Self::PatientName => "patient_name",
            Self::PatientId => "patient_id",
            Self::AccessionNumber => "accession_number",
            Self::ReferringPhysicianName => "referring_physician_name",
            Self::InstitutionName => "institution_name",
            Self::SeriesDescription => "series_description",
            Self::Manufacturer => "manufacturer",
            Self::Modality => "modality",
            Self::BodyPartExamined => "body_part_examined",
            Self::ProtocolName => "protocol_name",
            Self::ImageType => "image_type",
            Self::SopClassUid => "sop_class_uid",
        }
    }

    /// DICOM keyword the value is stored under in a [`TagMap`]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::StudyDescription => "StudyDescription",
            Self::PatientName => "PatientName",
            Self::PatientId => "PatientID",
            Self::AccessionNumber => "AccessionNumber",
            Self::ReferringPhysicianName => "ReferringPhysicianName",
            Self::InstitutionName => "InstitutionName",
            Self::SeriesDescription => "SeriesDescription",
            Self::Manufacturer => "Manufacturer",
            Self::Modality => "Modality",
            Self::BodyPartExamined => "BodyPartExamined",
            Self::ProtocolName => "ProtocolName",
            Self::ImageType => "ImageType",
            Self::SopClassUid => "SOPClassUID",
        }
    }

    pub fn scope(&self) -> TagScope {
        match self {
            Self::StudyDescription
            | Self::PatientName
            | Self::PatientId
            | Self::AccessionNumber
            | Self::ReferringPhysicianName
            | Self::InstitutionName => TagScope::Study,
            Self::SeriesDescription
            | Self::Manufacturer
            | Self::Modality
            | Self::BodyPartExamined
            | Self::ProtocolName
            | Self::ImageType
            | Self::SopClassUid => TagScope::Instance,
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.config_name() == name)
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// One `(field, operator, expected)` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCondition {
    pub field: TagField,
    pub operator: Operator,
    pub expected: String,
}

impl MatchCondition {
    /// Parse a `<field>_<operator>` configuration key
    pub fn parse_key(key: &str) -> Option<(TagField, Operator)> {
        Operator::PARSE_ORDER.into_iter().find_map(|op| {
            let field = key.strip_suffix(op.as_str())?.strip_suffix('_')?;
            TagField::from_config_name(field).map(|f| (f, op))
        })
    }

    pub fn from_key(key: &str, expected: impl Into<String>) -> Option<Self> {
        Self::parse_key(key).map(|(field, operator)| Self {
            field,
            operator,
            expected: expected.into(),
        })
    }

    /// Configuration key this clause was parsed from
    pub fn key(&self) -> String {
        format!("{}_{}", self.field.config_name(), self.operator.as_str())
    }

    /// Evaluate against study tags and, at instance granularity, one instance's tags
    ///
    /// Study-scoped fields read the study tags and fall back to the instance's
    /// copy when the study map lacks them. Instance-scoped fields require
    /// `instance_tags`.
    pub fn is_satisfied_by(&self, study_tags: &TagMap, instance_tags: Option<&TagMap>) -> bool {
        let keyword = self.field.keyword();
        let actual = match self.field.scope() {
            TagScope::Study => study_tags
                .lookup(keyword)
                .or_else(|| instance_tags.and_then(|tags| tags.lookup(keyword))),
            TagScope::Instance => match instance_tags {
                Some(tags) => tags.lookup(keyword),
                None => return false,
            },
        };
        evaluate(self.operator, actual, &self.expected)
    }
}

/// What a matched rule sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// The whole study
    #[serde(alias = "study", alias = "whole_study")]
    StudyWhole,
    /// Each matching instance individually
    Instance,
    /// The single instance with the largest ranking metric
    HighestResolution,
}

impl SendMode {
    /// Granularity the rule is evaluated at
    pub fn granularity(&self) -> Granularity {
        match self {
            Self::StudyWhole | Self::HighestResolution => Granularity::Study,
            Self::Instance => Granularity::Instance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyWhole => "study_whole",
            Self::Instance => "instance",
            Self::HighestResolution => "highest_resolution",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    pub send_mode: SendMode,
    pub destinations: Vec<String>,
}

/// Rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(rename = "match")]
    pub conditions: BTreeMap<String, String>,
    pub action: RuleAction,
}

/// Validated, immutable routing rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<MatchCondition>,
    pub action: RuleAction,
}

impl Rule {
    /// Validate a configured rule
    pub fn compile(definition: &RuleDefinition) -> Result<Self, ConfigurationError> {
        let name = definition.name.trim();
        if name.is_empty() {
            return Err(ConfigurationError::missing_field("name", "rule definition"));
        }

        if definition.conditions.is_empty() {
            return Err(ConfigurationError::invalid_rule(
                name,
                "at least one match condition is required",
            ));
        }

        let conditions = definition
            .conditions
            .iter()
            .map(|(key, expected)| {
                MatchCondition::from_key(key, expected.clone()).ok_or_else(|| {
                    ConfigurationError::UnknownMatchCondition {
                        rule: name.to_string(),
                        key: key.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if definition.action.destinations.is_empty() {
            return Err(ConfigurationError::invalid_rule(
                name,
                "at least one destination is required",
            ));
        }
        let mut seen = HashSet::new();
        for destination in &definition.action.destinations {
            if destination.trim().is_empty() {
                return Err(ConfigurationError::invalid_rule(
                    name,
                    "destination names must not be empty",
                ));
            }
            if !seen.insert(destination.as_str()) {
                return Err(ConfigurationError::invalid_rule(
                    name,
                    format!("destination '{destination}' listed twice"),
                ));
            }
        }

        Ok(Self {
            name: name.to_string(),
            conditions,
            action: definition.action.clone(),
        })
    }

    /// Compile an ordered rule set; names must be unique
    pub fn compile_all(definitions: &[RuleDefinition]) -> Result<Vec<Self>, ConfigurationError> {
        let mut names = HashSet::new();
        definitions
            .iter()
            .map(|definition| {
                let rule = Self::compile(definition)?;
                if !names.insert(rule.name.clone()) {
                    return Err(ConfigurationError::DuplicateRuleName { name: rule.name });
                }
                Ok(rule)
            })
            .collect()
    }

    pub fn granularity(&self) -> Granularity {
        self.action.send_mode.granularity()
    }

    /// True only when every clause holds
    pub fn matches(&self, study_tags: &TagMap, instance_tags: Option<&TagMap>) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.is_satisfied_by(study_tags, instance_tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(
        name: &str,
        conditions: &[(&str, &str)],
        send_mode: SendMode,
        destinations: &[&str],
    ) -> RuleDefinition {
        RuleDefinition {
            name: name.to_string(),
            conditions: conditions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            action: RuleAction {
                send_mode,
                destinations: destinations.iter().map(|d| d.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_parse_key_prefers_negated_operators() {
        assert_eq!(
            MatchCondition::parse_key("series_description_not_contains"),
            Some((TagField::SeriesDescription, Operator::NotContains))
        );
        assert_eq!(
            MatchCondition::parse_key("manufacturer_equals"),
            Some((TagField::Manufacturer, Operator::Equals))
        );
        assert_eq!(
            MatchCondition::parse_key("modality_not_equals"),
            Some((TagField::Modality, Operator::NotEquals))
        );
    }

    #[test]
    fn test_parse_key_rejects_unknown_fields_and_operators() {
        assert_eq!(MatchCondition::parse_key("scanner_contains"), None);
        assert_eq!(MatchCondition::parse_key("study_description_startswith"), None);
        assert_eq!(MatchCondition::parse_key("contains"), None);
        assert_eq!(MatchCondition::parse_key("study_descriptioncontains"), None);
    }

    #[test]
    fn test_compile_rejects_bad_definitions() {
        let unknown = definition("r", &[("scanner_contains", "x")], SendMode::Instance, &["A"]);
        assert!(matches!(
            Rule::compile(&unknown),
            Err(ConfigurationError::UnknownMatchCondition { .. })
        ));

        let no_clauses = definition("r", &[], SendMode::Instance, &["A"]);
        assert!(Rule::compile(&no_clauses).is_err());

        let no_destinations = definition("r", &[("modality_equals", "CT")], SendMode::Instance, &[]);
        assert!(Rule::compile(&no_destinations).is_err());

        let blank_name = definition(" ", &[("modality_equals", "CT")], SendMode::Instance, &["A"]);
        assert!(Rule::compile(&blank_name).is_err());
    }

    #[test]
    fn test_compile_all_rejects_duplicate_names() {
        let a = definition("dup", &[("modality_equals", "CT")], SendMode::Instance, &["A"]);
        let b = definition("dup", &[("modality_equals", "MR")], SendMode::Instance, &["B"]);
        assert!(matches!(
            Rule::compile_all(&[a, b]),
            Err(ConfigurationError::DuplicateRuleName { name }) if name == "dup"
        ));
    }

    #[test]
    fn test_rule_requires_every_clause() {
        let rule = Rule::compile(&definition(
            "qa_visualization",
            &[
                ("manufacturer_equals", "STANFORDAIDE"),
                ("series_description_not_contains", "Table"),
            ],
            SendMode::Instance,
            &["LPCHROUTER"],
        ))
        .unwrap();

        let study = TagMap::new();
        let visualization = TagMap::new()
            .with("Manufacturer", "StanfordAIDE")
            .with("SeriesDescription", "QA Visualization");
        let table = TagMap::new()
            .with("Manufacturer", "StanfordAIDE")
            .with("SeriesDescription", "QA Table");

        assert!(rule.matches(&study, Some(&visualization)));
        assert!(!rule.matches(&study, Some(&table)));
    }

    #[test]
    fn test_instance_clause_fails_at_study_granularity() {
        let rule = Rule::compile(&definition(
            "series",
            &[("series_description_not_contains", "Table")],
            SendMode::HighestResolution,
            &["A"],
        ))
        .unwrap();

        // Would trivially hold against an empty instance, but there is none
        assert!(!rule.matches(&TagMap::new(), None));
        assert!(rule.matches(&TagMap::new(), Some(&TagMap::new())));
    }

    #[test]
    fn test_study_clause_falls_back_to_instance_copy() {
        let rule = Rule::compile(&definition(
            "bone",
            &[("study_description_contains", "bone length")],
            SendMode::Instance,
            &["A"],
        ))
        .unwrap();

        let instance = TagMap::new().with("StudyDescription", "BONE LENGTH STUDY");
        assert!(rule.matches(&TagMap::new(), Some(&instance)));
        assert!(!rule.matches(&TagMap::new(), None));
    }

    #[test]
    fn test_removing_a_clause_never_shrinks_matches() {
        let full = definition(
            "full",
            &[
                ("study_description_contains", "bone"),
                ("patient_name_not_equals", "TEST^PATIENT"),
            ],
            SendMode::StudyWhole,
            &["A"],
        );
        let mut reduced = full.clone();
        reduced.conditions.remove("patient_name_not_equals");

        let full = Rule::compile(&full).unwrap();
        let reduced = Rule::compile(&reduced).unwrap();

        let matching = TagMap::new()
            .with("StudyDescription", "Bone length")
            .with("PatientName", "DOE^JANE");
        let test_patient = TagMap::new()
            .with("StudyDescription", "Bone length")
            .with("PatientName", "test^patient");

        assert!(full.matches(&matching, None));
        assert!(reduced.matches(&matching, None));
        // Dropping the clause widens the match to the test patient
        assert!(!full.matches(&test_patient, None));
        assert!(reduced.matches(&test_patient, None));
    }

    #[test]
    fn test_send_mode_granularity_and_aliases() {
        assert_eq!(SendMode::StudyWhole.granularity(), Granularity::Study);
        assert_eq!(SendMode::HighestResolution.granularity(), Granularity::Study);
        assert_eq!(SendMode::Instance.granularity(), Granularity::Instance);

        let mode: SendMode = serde_json::from_str("\"study\"").unwrap();
        assert_eq!(mode, SendMode::StudyWhole);
        let mode: SendMode = serde_json::from_str("\"highest_resolution\"").unwrap();
        assert_eq!(mode, SendMode::HighestResolution);
    }
}
