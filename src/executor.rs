//! Plan Executor
//!
//! Deterministically evaluates a Query Plan against the Table Store. No model
//! calls happen here. Each metric is computed independently: a failure is
//! recorded as a structured error value for that metric and never aborts the
//! rest of the plan. Stateless across calls.

use crate::plan::{Aggregation, Comparison, Filter, FilterOp, MetricSpec, QueryPlan, TimeScope};
use crate::table_store::{Scalar, Table, TableStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Outcome for one metric: a computed value (echoing what produced it, for
/// the summarizer) or a reason it could not be computed.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricResult {
    Value {
        value: f64,
        dataset: String,
        column: String,
        agg: Aggregation,
        filters: Vec<Filter>,
    },
    Error {
        error: String,
    },
}

impl MetricResult {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricResult::Value { value, .. } => Some(*value),
            MetricResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MetricResult::Error { error } => Some(error),
            MetricResult::Value { .. } => None,
        }
    }
}

/// A resolved `which_is_greater` directive: both side values (where
/// computable) and the winning metric name, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub left_metric: Option<String>,
    pub right_metric: Option<String>,
    pub left_value: Option<f64>,
    pub right_value: Option<f64>,
    pub winner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ExecutionOutcome {
    pub results: BTreeMap<String, MetricResult>,
    pub comparison: Option<ComparisonOutcome>,
}

pub struct PlanExecutor {
    tables: Arc<TableStore>,
}

impl PlanExecutor {
    pub fn new(tables: Arc<TableStore>) -> Self {
        Self { tables }
    }

    /// Pure function of (plan, table store snapshot): one result entry per
    /// metric, in the order given by the metric names, plus the resolved
    /// comparison when the plan requested one.
    pub fn execute(&self, plan: &QueryPlan) -> ExecutionOutcome {
        let mut results = BTreeMap::new();
        for metric in &plan.metrics {
            let result = self.compute_metric(metric, &plan.time_scope);
            results.insert(metric.name.clone(), result);
        }
        let comparison = resolve_comparison(&plan.comparison, &results);
        ExecutionOutcome {
            results,
            comparison,
        }
    }

    fn compute_metric(&self, metric: &MetricSpec, time_scope: &TimeScope) -> MetricResult {
        let table = match self.tables.get(&metric.dataset) {
            Some(table) => table,
            None => {
                return MetricResult::Error {
                    error: format!("Unknown dataset {}", metric.dataset),
                }
            }
        };

        if !table.has_column(&metric.column) {
            return MetricResult::Error {
                error: format!("Unknown column {} in {}", metric.column, metric.dataset),
            };
        }

        let values: Vec<f64> = table
            .rows
            .iter()
            .filter(|row| time_scope_matches(table, row, time_scope))
            .filter(|row| filters_match(table, row, &metric.filters))
            .filter_map(|row| row.get(&metric.column))
            .filter_map(Scalar::as_f64)
            .collect();

        if values.is_empty() {
            return MetricResult::Error {
                error: "No data after filtering".to_string(),
            };
        }

        let value = match metric.agg {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Other(ref other) => {
                return MetricResult::Error {
                    error: format!("Unknown agg {}", other),
                }
            }
        };

        MetricResult::Value {
            value,
            dataset: metric.dataset.clone(),
            column: metric.column.clone(),
            agg: metric.agg.clone(),
            filters: metric.filters.clone(),
        }
    }
}

/// Year-based scoping by substring match against the first date-like column.
/// Tables with no date column are not scoped at all.
fn time_scope_matches(table: &Table, row: &HashMap<String, Scalar>, scope: &TimeScope) -> bool {
    let years: Vec<String> = match scope {
        TimeScope::All => return true,
        TimeScope::Year { year } => vec![year.to_string()],
        TimeScope::Range {
            start_year,
            end_year,
        } => (*start_year..=*end_year).map(|y| y.to_string()).collect(),
    };

    let Some(date_column) = table.first_date_column() else {
        return true;
    };

    let cell = match row.get(date_column) {
        Some(cell) => cell.display(),
        None => return false,
    };
    years.iter().any(|year| cell.contains(year.as_str()))
}

/// All filters ANDed together. Filters naming a column the table does not
/// have are skipped, so a plan can over-specify filters defensively.
fn filters_match(table: &Table, row: &HashMap<String, Scalar>, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        if !table.has_column(&filter.column) {
            return true;
        }
        let cell = row.get(&filter.column).unwrap_or(&Scalar::Null);
        filter_matches(cell, filter.op, &filter.value)
    })
}

fn filter_matches(cell: &Scalar, op: FilterOp, value: &Scalar) -> bool {
    match op {
        FilterOp::Eq => scalar_eq(cell, value),
        FilterOp::Ne => !scalar_eq(cell, value),
        FilterOp::Lt | FilterOp::Le | FilterOp::Gt | FilterOp::Ge => {
            let (Some(left), Some(right)) = (cell.as_f64(), value.as_f64()) else {
                return false;
            };
            match op {
                FilterOp::Lt => left < right,
                FilterOp::Le => left <= right,
                FilterOp::Gt => left > right,
                FilterOp::Ge => left >= right,
                _ => false,
            }
        }
    }
}

/// Equality compares numerically when both sides are numeric (so a textual
/// "2020" date cell equals the number 2020), otherwise by exact string.
/// Nulls equal nothing, including each other.
fn scalar_eq(cell: &Scalar, value: &Scalar) -> bool {
    if cell.is_null() || value.is_null() {
        return false;
    }
    if let (Some(left), Some(right)) = (cell.as_f64(), value.as_f64()) {
        return left == right;
    }
    cell.display() == value.display()
}

fn resolve_comparison(
    comparison: &Comparison,
    results: &BTreeMap<String, MetricResult>,
) -> Option<ComparisonOutcome> {
    match comparison {
        Comparison::None => None,
        Comparison::WhichIsGreater {
            left_metric,
            right_metric,
        } => {
            let left_value = left_metric
                .as_ref()
                .and_then(|name| results.get(name))
                .and_then(MetricResult::value);
            let right_value = right_metric
                .as_ref()
                .and_then(|name| results.get(name))
                .and_then(MetricResult::value);
            let winner = match (left_value, right_value) {
                (Some(left), Some(right)) if left > right => left_metric.clone(),
                (Some(left), Some(right)) if right > left => right_metric.clone(),
                _ => None,
            };
            Some(ComparisonOutcome {
                left_metric: left_metric.clone(),
                right_metric: right_metric.clone(),
                left_value,
                right_value,
                winner,
            })
        }
    }
}
