//! Query Plan
//!
//! The contract object between the Plan Compiler and the Plan Executor: which
//! datasets/columns to read, how to aggregate, how to restrict by time and by
//! filters, and whether two metrics should be compared. The shape mirrors the
//! JSON the model is instructed to emit; everything is a closed type so a plan
//! that parsed is a plan the executor can evaluate.

use crate::error::{AssistantError, Result};
use crate::table_store::Scalar;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeScope {
    #[default]
    All,
    Year {
        year: i32,
    },
    Range {
        start_year: i32,
        end_year: i32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

/// One column restriction. Unknown columns are skipped at execution time so
/// the planner may over-specify filters defensively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Scalar,
}

/// Requested aggregation. Anything outside the contract set is carried as
/// `Other` and becomes a per-metric execution error rather than a parse
/// failure for the whole plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Max,
    Min,
    Other(String),
}

impl Aggregation {
    pub fn as_str(&self) -> &str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Other(other) => other,
        }
    }
}

impl Serialize for Aggregation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Aggregation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "sum" => Aggregation::Sum,
            "mean" => Aggregation::Mean,
            "max" => Aggregation::Max,
            "min" => Aggregation::Min,
            _ => Aggregation::Other(raw),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Unique key for this metric within the plan; used as the result key.
    pub name: String,
    pub dataset: String,
    pub column: String,
    pub agg: Aggregation,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    None,
    WhichIsGreater {
        #[serde(default)]
        left_metric: Option<String>,
        #[serde(default)]
        right_metric: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryPlan {
    #[serde(default)]
    pub time_scope: TimeScope,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
    #[serde(default)]
    pub comparison: Comparison,
}

impl QueryPlan {
    /// The fallback plan substituted for malformed model output: no metrics,
    /// no time restriction, no comparison.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn is_noop(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Boundary validation applied before the executor ever sees the plan.
    /// Metric names must be unique (they key the result map) and a comparison
    /// may only reference metrics that exist.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for metric in &self.metrics {
            if !names.insert(metric.name.as_str()) {
                return Err(AssistantError::Llm(format!(
                    "Duplicate metric name '{}' in plan",
                    metric.name
                )));
            }
        }
        if let Comparison::WhichIsGreater {
            left_metric,
            right_metric,
        } = &self.comparison
        {
            for reference in [left_metric, right_metric].into_iter().flatten() {
                if !names.contains(reference.as_str()) {
                    return Err(AssistantError::Llm(format!(
                        "Comparison references unknown metric '{}'",
                        reference
                    )));
                }
            }
        }
        Ok(())
    }
}
