//! # Instance Selection
//!
//! Picks the single "best" instance among the siblings of a study for
//! `highest_resolution` rules.

use crate::archive::{ResourceRef, TagMap};
use crate::constants::tags::{COLUMNS, ROWS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ranking metric used to compare sibling instances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    /// `Rows * Columns`
    #[default]
    PixelArea,
    Rows,
    Columns,
}

impl RankingMetric {
    /// Score of one instance; unparsable or missing dimensions count as 0
    pub fn score(&self, tags: &TagMap) -> u64 {
        let rows = parse_dimension(tags.get(ROWS));
        let columns = parse_dimension(tags.get(COLUMNS));
        match self {
            Self::PixelArea => rows.saturating_mul(columns),
            Self::Rows => rows,
            Self::Columns => columns,
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PixelArea => write!(f, "pixel_area"),
            Self::Rows => write!(f, "rows"),
            Self::Columns => write!(f, "columns"),
        }
    }
}

fn parse_dimension(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u64>() {
        return value;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value as u64,
        _ => 0,
    }
}

/// Winning instance and its score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<'a> {
    pub instance: &'a ResourceRef,
    pub score: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceSelector {
    metric: RankingMetric,
}

impl InstanceSelector {
    pub fn new(metric: RankingMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> RankingMetric {
        self.metric
    }

    /// Pick the candidate with the strictly largest score
    ///
    /// Candidates whose tags could not be resolved are skipped. Ties keep the
    /// first candidate in iteration order. Returns `None` when no candidate
    /// has tags.
    pub fn select_best<'a, I>(&self, candidates: I) -> Option<Selection<'a>>
    where
        I: IntoIterator<Item = (&'a ResourceRef, Option<&'a TagMap>)>,
    {
        candidates
            .into_iter()
            .filter_map(|(instance, tags)| {
                tags.map(|tags| Selection {
                    instance,
                    score: self.metric.score(tags),
                })
            })
            .fold(None, |best: Option<Selection<'a>>, candidate| match best {
                Some(current) if candidate.score <= current.score => Some(current),
                _ => Some(candidate),
            })
    }
}
