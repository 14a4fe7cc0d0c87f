//! Answer Summarizer
//!
//! Presentation step: turns (question, plan, metric results) into a short
//! natural-language explanation. The model is asked to name the datasets,
//! columns and aggregations actually used, call out the greater side of a
//! comparison, and mention limitations as caveats. When the model is
//! unavailable the summarizer degrades to a templated answer built from the
//! computed values, so the caller always receives something.

use crate::executor::{ExecutionOutcome, MetricResult};
use crate::llm::CompletionModel;
use crate::plan::QueryPlan;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You are a concise analyst. Given a plan and computed numbers, explain the answer in under 150 words.\n\
Rules:\n\
- Explicitly say which datasets and columns were used (by name).\n\
- Describe how you aggregated (e.g., 'average of safely_managed_pct over all years').\n\
- If a comparison was requested, clearly say which side is larger.\n\
- Briefly mention any limitations (e.g., missing years or metrics that errored) as your 'double check'.\n\
- Never introduce numbers that are not present in the results.";

pub struct AnswerSummarizer {
    model: Arc<dyn CompletionModel>,
}

impl AnswerSummarizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Never fails: a model error or empty response degrades to the
    /// templated answer.
    pub async fn summarize(
        &self,
        question: &str,
        plan: &QueryPlan,
        outcome: &ExecutionOutcome,
    ) -> String {
        let payload = json!({
            "question": question,
            "plan": plan,
            "results": outcome.results,
            "comparison": outcome.comparison,
        });
        let user = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());

        match self.model.summarize(SUMMARIZER_SYSTEM_PROMPT, &user).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Empty summary from model, using templated answer");
                fallback_answer(outcome)
            }
            Err(e) => {
                warn!("Summary completion failed, using templated answer: {}", e);
                fallback_answer(outcome)
            }
        }
    }
}

/// Templated degradation path: list the raw metric values and caveats.
pub fn fallback_answer(outcome: &ExecutionOutcome) -> String {
    if outcome.results.is_empty() {
        return "I could not confidently answer that question from the available datasets. \
                Try mentioning a dataset topic, a country, or a year."
            .to_string();
    }

    let mut lines = vec!["Here is what I could compute:".to_string()];
    for (name, result) in &outcome.results {
        match result {
            MetricResult::Value {
                value,
                dataset,
                column,
                agg,
                ..
            } => lines.push(format!(
                "- {}: {:.2} ({} of {}.{})",
                name,
                value,
                agg.as_str(),
                dataset,
                column
            )),
            MetricResult::Error { error } => {
                lines.push(format!("- {}: not computed ({})", name, error))
            }
        }
    }

    if let Some(comparison) = &outcome.comparison {
        match (&comparison.winner, comparison.left_value, comparison.right_value) {
            (Some(winner), Some(left), Some(right)) => lines.push(format!(
                "{} is the greater side ({:.2} vs {:.2}).",
                winner,
                left.max(right),
                left.min(right)
            )),
            _ => lines.push(
                "The requested comparison could not be resolved from the computed metrics."
                    .to_string(),
            ),
        }
    }

    lines.join("\n")
}
