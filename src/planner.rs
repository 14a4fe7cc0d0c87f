//! Plan Compiler
//!
//! Turns (question, retrieved documentation) into a Query Plan via the
//! language model. The model is held to a fixed contract: a single JSON
//! object matching the plan schema, no prose. Output that fails to parse or
//! fails boundary validation is replaced by the no-op plan, so the executor
//! always receives a well-formed plan.

use crate::llm::CompletionModel;
use crate::plan::QueryPlan;
use crate::semantic_index::vector_store::{DocKind, SearchResult};
use crate::semantic_index::{SemanticIndex, DEFAULT_TOP_K};
use std::sync::Arc;
use tracing::{debug, warn};

const PLANNER_SYSTEM_PROMPT: &str = "\
You are a data analysis planner for water and sanitation datasets.\n\
You see:\n\
1) A user question.\n\
2) Documentation about datasets and columns.\n\
\n\
You must output ONLY a JSON object describing HOW to compute the answer.\n\
Do NOT include any prose explanation. JSON only.\n\
\n\
Planning rules:\n\
- If the user asks about percentages or coverage, prefer columns whose names contain '_pct' or 'percentage'.\n\
- If the question compares two named entities (e.g., Cameroon vs Uganda), create one metric per entity, \
each restricted with a 'country' filter, and set comparison.type='which_is_greater' with \
left_metric/right_metric naming those metrics.\n\
- If the user asks about a single specific year (e.g. 'in 2020'), either set time_scope.type='year' with \
time_scope.year = that year, OR add a filter on the appropriate date column (e.g. column='date_YY', op='==', value=2020).\n\
- If the user compares two explicit years (e.g. '2020 compared to 2022'), create two separate metrics, \
one filtered to each year, and keep time_scope.type='all'.\n\
- If the question asks about 'over the years' or 'on average' with no specific year, aggregate over all \
available years using agg='mean' with time_scope.type='all'.\n\
- You must use dataset and column names exactly as seen in the context snippets, never invented ones.\n\
- Use filters to restrict by country when relevant (e.g., column='country', op='==', value='Cameroon').";

pub struct PlanCompiler {
    model: Arc<dyn CompletionModel>,
    index: Arc<SemanticIndex>,
    top_k: usize,
}

impl PlanCompiler {
    pub fn new(model: Arc<dyn CompletionModel>, index: Arc<SemanticIndex>) -> Self {
        Self {
            model,
            index,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Compile a question into a plan. Never fails: retrieval problems plan
    /// without context, and any model failure yields the no-op plan.
    pub async fn compile(&self, question: &str) -> QueryPlan {
        let retrieved = match self.index.retrieve(question, self.top_k).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Document retrieval failed, planning without context: {}", e);
                Vec::new()
            }
        };

        let context = render_context(&retrieved);
        let user = build_user_prompt(question, &context);

        let raw = match self.model.compile_plan(PLANNER_SYSTEM_PROMPT, &user).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Plan completion failed, falling back to no-op plan: {}", e);
                return QueryPlan::noop();
            }
        };

        parse_plan(&raw)
    }
}

/// Parse and validate raw model output, falling back to the no-op plan on any
/// violation of the contract.
pub fn parse_plan(raw: &str) -> QueryPlan {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<QueryPlan>(cleaned) {
        Ok(plan) => match plan.validate() {
            Ok(()) => {
                debug!("Compiled plan with {} metrics", plan.metrics.len());
                plan
            }
            Err(e) => {
                warn!("Plan failed validation, falling back to no-op plan: {}", e);
                QueryPlan::noop()
            }
        },
        Err(e) => {
            warn!("Plan JSON decode failed, falling back to no-op plan: {}", e);
            QueryPlan::noop()
        }
    }
}

fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn render_context(retrieved: &[SearchResult]) -> String {
    let mut snippets = Vec::new();
    for result in retrieved {
        let document = &result.document;
        let kind = match document.kind {
            DocKind::Dataset => "dataset",
            DocKind::Column => "column",
        };
        snippets.push(format!(
            "[{}] dataset={}, column={}\n{}",
            kind,
            document.dataset,
            document.column.as_deref().unwrap_or(""),
            document.text
        ));
    }
    snippets.join("\n\n---\n\n")
}

fn build_user_prompt(question: &str, context: &str) -> String {
    format!(
        "USER QUESTION:\n{question}\n\n\
         AVAILABLE CONTEXT (datasets and columns):\n{context}\n\n\
         TASK:\n\
         - Decide which datasets and columns to use.\n\
         - Decide what aggregations to perform (sum, mean, max, min).\n\
         - Infer a simple time_scope if the user mentions a year or range.\n\
         - For comparisons, set comparison.type appropriately.\n\n\
         You MUST output JSON with this exact structure:\n\n\
         {{\n\
           \"time_scope\": {{\n\
             \"type\": \"all | year | range\",\n\
             \"year\": 2020,\n\
             \"start_year\": 2018,\n\
             \"end_year\": 2020\n\
           }},\n\
           \"metrics\": [\n\
             {{\n\
               \"name\": \"string_unique_key\",\n\
               \"dataset\": \"one_of_the_dataset_names\",\n\
               \"agg\": \"sum | mean | max | min\",\n\
               \"column\": \"one_column_name\",\n\
               \"filters\": [\n\
                 {{\"column\": \"col_name\", \"op\": \">\", \"value\": 0}}\n\
               ]\n\
             }}\n\
           ],\n\
           \"comparison\": {{\n\
             \"type\": \"none | which_is_greater\",\n\
             \"left_metric\": \"name_from_metrics_or_null\",\n\
             \"right_metric\": \"name_from_metrics_or_null\"\n\
           }}\n\
         }}\n\n\
         Rules:\n\
         - If the question clearly asks to compare two things, use type='which_is_greater'.\n\
         - If no comparison is needed, use type='none' and set metrics accordingly.\n\
         - filters can be an empty list if no filter is needed.\n\
         - Use dataset and column names exactly as seen in the context.\n\
         - If you're unsure about exact time, use time_scope.type = \"all\"."
    )
}
