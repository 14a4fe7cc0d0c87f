//! End-to-end pipeline tests with deterministic model and embedder stubs.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use wash_assistant::assistant::Assistant;
use wash_assistant::catalog::{Catalog, DatasetDescriptor};
use wash_assistant::error::{AssistantError, Result as AssistantResult};
use wash_assistant::executor::PlanExecutor;
use wash_assistant::llm::CompletionModel;
use wash_assistant::planner::parse_plan;
use wash_assistant::semantic_index::embedder::Embedder;
use wash_assistant::semantic_index::SemanticIndex;
use wash_assistant::table_store::TableStore;

/// Deterministic embedder: character histogram over a small vector.
struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> AssistantResult<Vec<f32>> {
        let mut vector = vec![0.0f32; 16];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 16] += byte as f32 / 255.0;
        }
        Ok(vector)
    }
}

/// Scripted model: returns a fixed plan, and summarizes by echoing the
/// computed metric values and the comparison winner from the payload.
struct ScriptedModel {
    plan_json: String,
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn compile_plan(&self, _system: &str, _user: &str) -> AssistantResult<String> {
        Ok(self.plan_json.clone())
    }

    async fn summarize(&self, _system: &str, user: &str) -> AssistantResult<String> {
        let payload: serde_json::Value = serde_json::from_str(user)
            .map_err(|e| AssistantError::Llm(format!("bad payload: {}", e)))?;
        let mut parts = Vec::new();
        if let Some(results) = payload["results"].as_object() {
            for (name, result) in results {
                if let Some(value) = result["value"].as_f64() {
                    parts.push(format!("{}={}", name, value));
                }
            }
        }
        if let Some(winner) = payload["comparison"]["winner"].as_str() {
            parts.push(format!("winner={}", winner));
        }
        Ok(parts.join("; "))
    }
}

/// Model that fails at planning and summarizing alike.
struct DownModel;

#[async_trait]
impl CompletionModel for DownModel {
    async fn compile_plan(&self, _system: &str, _user: &str) -> AssistantResult<String> {
        Err(AssistantError::Llm("model unavailable".to_string()))
    }

    async fn summarize(&self, _system: &str, _user: &str) -> AssistantResult<String> {
        Err(AssistantError::Llm("model unavailable".to_string()))
    }
}

fn water_access_fixture(dir_name: &str) -> Result<(Catalog, Arc<TableStore>, PathBuf)> {
    let dir = std::env::temp_dir().join(dir_name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir)?;

    let csv_path = dir.join("water_access.csv");
    fs::write(
        &csv_path,
        "country,safely_managed_pct,date_YY\n\
         Kenya,80,2020\n\
         Kenya,90,2021\n\
         Uganda,50,2020\n",
    )?;

    let catalog = Catalog::new(vec![DatasetDescriptor::new(
        "water_access",
        csv_path,
        "Water access levels by zone across multiple countries.",
        "- country: Country name\n- safely_managed_pct: Percentage safely managed\n- date_YY: Year\n",
    )]);
    let tables = Arc::new(TableStore::load(&catalog)?);
    Ok((catalog, tables, dir))
}

async fn build_assistant(
    dir_name: &str,
    model: Arc<dyn CompletionModel>,
) -> Result<(Assistant, Arc<TableStore>)> {
    let (catalog, tables, dir) = water_access_fixture(dir_name)?;
    let index = Arc::new(
        SemanticIndex::open(&catalog, &tables, Arc::new(HashEmbedder), &dir.join("idx")).await?,
    );
    let assistant = Assistant::new(Arc::clone(&tables), index, model);
    Ok((assistant, tables))
}

#[tokio::test]
async fn average_for_one_country_end_to_end() -> Result<()> {
    let plan_json = r#"{
        "time_scope": {"type": "all"},
        "metrics": [{
            "name": "m1",
            "dataset": "water_access",
            "column": "safely_managed_pct",
            "agg": "mean",
            "filters": [{"column": "country", "op": "==", "value": "Kenya"}]
        }],
        "comparison": {"type": "none"}
    }"#;
    let model = Arc::new(ScriptedModel {
        plan_json: plan_json.to_string(),
    });
    let (assistant, tables) = build_assistant("wash_assistant_e2e_kenya", model).await?;

    // the executor computes the average of 80 and 90
    let executor = PlanExecutor::new(tables);
    let outcome = executor.execute(&parse_plan(plan_json));
    assert_eq!(outcome.results.get("m1").unwrap().value(), Some(85.0));

    let answer = assistant
        .answer("What is the average safely_managed_pct for Kenya?")
        .await;
    assert!(answer.contains("m1=85"), "unexpected answer: {}", answer);
    Ok(())
}

#[tokio::test]
async fn country_comparison_names_the_winner() -> Result<()> {
    let plan_json = r#"{
        "time_scope": {"type": "all"},
        "metrics": [
            {
                "name": "kenya_mean",
                "dataset": "water_access",
                "column": "safely_managed_pct",
                "agg": "mean",
                "filters": [{"column": "country", "op": "==", "value": "Kenya"}]
            },
            {
                "name": "uganda_mean",
                "dataset": "water_access",
                "column": "safely_managed_pct",
                "agg": "mean",
                "filters": [{"column": "country", "op": "==", "value": "Uganda"}]
            }
        ],
        "comparison": {
            "type": "which_is_greater",
            "left_metric": "kenya_mean",
            "right_metric": "uganda_mean"
        }
    }"#;
    let model = Arc::new(ScriptedModel {
        plan_json: plan_json.to_string(),
    });
    let (assistant, _) = build_assistant("wash_assistant_e2e_compare", model).await?;

    let answer = assistant
        .answer("Are more Kenyans or Ugandans served safely managed water?")
        .await;
    assert!(answer.contains("kenya_mean=85"), "answer: {}", answer);
    assert!(answer.contains("uganda_mean=50"), "answer: {}", answer);
    assert!(answer.contains("winner=kenya_mean"), "answer: {}", answer);
    Ok(())
}

#[tokio::test]
async fn year_scoped_question_uses_only_matching_rows() -> Result<()> {
    let plan_json = r#"{
        "time_scope": {"type": "year", "year": 2020},
        "metrics": [{
            "name": "kenya_2020",
            "dataset": "water_access",
            "column": "safely_managed_pct",
            "agg": "mean",
            "filters": [{"column": "country", "op": "==", "value": "Kenya"}]
        }],
        "comparison": {"type": "none"}
    }"#;
    let model = Arc::new(ScriptedModel {
        plan_json: plan_json.to_string(),
    });
    let (assistant, _) = build_assistant("wash_assistant_e2e_year", model).await?;

    let answer = assistant
        .answer("What share of Kenyans had safely managed water in 2020?")
        .await;
    assert!(answer.contains("kenya_2020=80"), "answer: {}", answer);
    Ok(())
}

#[tokio::test]
async fn unavailable_model_still_produces_an_answer() -> Result<()> {
    let (assistant, _) = build_assistant("wash_assistant_e2e_down", Arc::new(DownModel)).await?;

    let answer = assistant.answer("anything at all").await;
    assert!(
        answer.contains("could not confidently answer"),
        "worst case must still be a readable sentence, got: {}",
        answer
    );
    Ok(())
}

#[tokio::test]
async fn bad_plan_references_surface_as_caveats_not_crashes() -> Result<()> {
    // plan names a column that does not exist; the metric errors, the
    // pipeline does not
    let plan_json = r#"{
        "metrics": [
            {"name": "ok", "dataset": "water_access", "column": "safely_managed_pct", "agg": "max"},
            {"name": "broken", "dataset": "water_access", "column": "ghost_pct", "agg": "mean"}
        ]
    }"#;
    let model = Arc::new(ScriptedModel {
        plan_json: plan_json.to_string(),
    });
    let (assistant, tables) = build_assistant("wash_assistant_e2e_caveat", model).await?;

    let executor = PlanExecutor::new(tables);
    let outcome = executor.execute(&parse_plan(plan_json));
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results.get("ok").unwrap().value(), Some(90.0));
    assert_eq!(
        outcome.results.get("broken").unwrap().error(),
        Some("Unknown column ghost_pct in water_access")
    );

    let answer = assistant.answer("max safely managed and a ghost").await;
    assert!(answer.contains("ok=90"), "answer: {}", answer);
    Ok(())
}
