//! Assistant Facade
//!
//! Orchestrates the full pipeline for one question: compile a plan, execute
//! it, summarize the results. Constructed once with its collaborators
//! injected; the table store and semantic index are shared read-only, so
//! independent questions may run concurrently on clones of the facade's
//! inputs. `answer` never fails for a non-empty question: every stage has a
//! deterministic degradation path.

use crate::executor::PlanExecutor;
use crate::llm::CompletionModel;
use crate::planner::PlanCompiler;
use crate::semantic_index::SemanticIndex;
use crate::summarizer::AnswerSummarizer;
use crate::table_store::TableStore;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct Assistant {
    compiler: PlanCompiler,
    executor: PlanExecutor,
    summarizer: AnswerSummarizer,
}

impl Assistant {
    pub fn new(
        tables: Arc<TableStore>,
        index: Arc<SemanticIndex>,
        model: Arc<dyn CompletionModel>,
    ) -> Self {
        Self {
            compiler: PlanCompiler::new(Arc::clone(&model), index),
            executor: PlanExecutor::new(tables),
            summarizer: AnswerSummarizer::new(model),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.compiler = self.compiler.with_top_k(top_k);
        self
    }

    /// Full pipeline: question -> plan -> execute -> summarize.
    pub async fn answer(&self, question: &str) -> String {
        let request_id = Uuid::new_v4();
        info!(%request_id, "Answering question: {}", question);

        let plan = self.compiler.compile(question).await;
        if let Ok(plan_json) = serde_json::to_string(&plan) {
            debug!(%request_id, "Compiled plan: {}", plan_json);
        }

        let outcome = self.executor.execute(&plan);
        if let Ok(results_json) = serde_json::to_string(&outcome.results) {
            debug!(%request_id, "Metric results: {}", results_json);
        }

        let answer = self.summarizer.summarize(question, &plan, &outcome).await;
        info!(%request_id, "Answer ready ({} chars)", answer.len());
        answer
    }
}
