//! The insight synthesis stage.
//!
//! Reads the job-scoped clustered extract, picks representative rows, and
//! asks the text model for structured insights. The model is instructed to
//! return strict JSON; one bounded re-ask is allowed on malformed output,
//! never an unbounded repair loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pulse_core::{JobId, ObjectPaths, PipelineConfig, StorageBackend};

use crate::clients::TextModel;
use crate::cluster::{self, ClusterRecord};
use crate::error::{Error, Result};

/// Attempts at parsing model output: the initial ask plus one re-ask.
const MODEL_OUTPUT_ATTEMPTS: u32 = 2;

/// One synthesized insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    /// The insight description.
    pub insight: String,
    /// Actionable recommendation addressing the insight.
    pub recommendation: String,
    /// A row exemplifying the insight.
    pub sample_row: Value,
}

/// The terminal artifact returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    /// Synthesized insights with recommendations.
    pub insights: Vec<Insight>,
    /// Overall summary of the insights.
    pub summary: String,
}

/// Synthesizes an insight report from the clustered extract.
pub struct InsightSynthesizer {
    storage: Arc<dyn StorageBackend>,
    model: Arc<dyn TextModel>,
    config: PipelineConfig,
}

impl InsightSynthesizer {
    /// Creates a synthesizer over the given storage and model.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        model: Arc<dyn TextModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            model,
            config,
        }
    }

    /// Produces the insight report for one job.
    ///
    /// # Errors
    ///
    /// - `Error::InsufficientData` if the extract is empty, degenerate, or
    ///   yields no representative rows
    /// - `Error::ModelOutput` if the model output stays malformed after the
    ///   bounded re-ask
    pub async fn synthesize(&self, query: &str, job_id: JobId) -> Result<InsightReport> {
        let key = ObjectPaths::clustered_results(job_id);
        let data = self.storage.get(&key).await?;
        let records = cluster::parse_clustered_extract(&data)?;

        // Row count 2 is the header-duplication anomaly of the upstream
        // extract writer; both it and an empty extract are unusable.
        if records.is_empty() || records.len() == 2 {
            return Err(Error::insufficient_data(format!(
                "clustered extract has {} data rows",
                records.len()
            )));
        }

        let representatives = cluster::select_representatives(&records);
        if representatives.is_empty() {
            return Err(Error::insufficient_data("no representative rows selected"));
        }
        tracing::info!(
            job_id = %job_id,
            total = records.len(),
            representatives = representatives.len(),
            "selected representative rows"
        );

        let prompt = synthesis_prompt(query, &representatives);
        let mut last_err = None;
        for attempt in 1..=MODEL_OUTPUT_ATTEMPTS {
            let output = self
                .model
                .generate(&self.config.model_id, &prompt)
                .await?;
            match parse_report(&output) {
                Ok(report) => return Ok(report),
                Err(err) => {
                    tracing::warn!(job_id = %job_id, attempt, error = %err, "model output malformed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::model_output("no model output")))
    }
}

/// Renders the fixed synthesis prompt: preamble, one block per
/// representative row, the user query, and the strict-JSON contract.
fn synthesis_prompt(query: &str, representatives: &[&ClusterRecord]) -> String {
    let mut prompt = String::from(
        "We have a large dataset of employee survey comments that have been processed using \
         clustering techniques. Each cluster represents a distinct theme or insight derived \
         from the data. To streamline the analysis and reduce token usage, we have selected \
         one representative comment from each cluster. Below are the top rows from each \
         cluster:\n\n",
    );
    for (idx, row) in representatives.iter().enumerate() {
        prompt.push_str(&format!("Cluster {}:\n- {}\n\n", idx + 1, row.render()));
    }
    prompt.push_str(&format!(
        "In response to the user query: '{query}', please generate detailed insights and \
         actionable recommendations based on the comments provided. Each insight should be \
         thoroughly explained with context, covering the key analysis and underlying factors. \
         For each insight, also provide a detailed recommendation that addresses the \
         identified issue, opportunity, or pattern. The recommendation should offer concrete \
         solutions or next steps. Additionally, include an entire sample row that exemplifies \
         each insight. Ensure the output is in JSON format with the following structure:\n\n\
         {{\n\
           \"insights\": [\n\
             {{\n\
               \"insight\": \"Insight description\",\n\
               \"recommendation\": \"Actionable recommendation\",\n\
               \"sample_row\": \"An entire row that illustrates the insight\"\n\
             }}\n\
           ],\n\
           \"summary\": \"Overall summary of the insights.\"\n\
         }}\n\n\
         Please ensure the JSON strictly follows the above format to facilitate parsing on \
         the frontend."
    ));
    prompt
}

/// Parses model output as a strict-JSON insight report.
///
/// # Errors
///
/// Returns `Error::ModelOutput` if the text is not JSON or lacks the
/// required top-level keys.
pub fn parse_report(output: &str) -> Result<InsightReport> {
    serde_json::from_str(output)
        .map_err(|e| Error::model_output(format!("expected strict JSON report: {e}")))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use pulse_core::{MemoryBackend, WritePrecondition};
    use serde_json::json;

    use super::*;
    use crate::clients::scripted::ScriptedTextModel;

    fn report_json() -> String {
        json!({
            "insights": [{
                "insight": "Burnout is driven by scheduling",
                "recommendation": "Pilot self-scheduling in the East region",
                "sample_row": "id: 4; comment_burnout_reason: back-to-back shifts"
            }],
            "summary": "Scheduling pressure dominates the feedback."
        })
        .to_string()
    }

    fn extract(rows: &[&str]) -> Bytes {
        let mut text = String::from("id,comment_burnout_reason,cluster,is_unique\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        Bytes::from(text)
    }

    async fn synthesizer_with(
        extract_data: Option<Bytes>,
        responses: Vec<String>,
    ) -> (InsightSynthesizer, JobId, Arc<ScriptedTextModel>) {
        let storage = Arc::new(MemoryBackend::new());
        let job_id = JobId::generate();
        if let Some(data) = extract_data {
            storage
                .put(
                    &ObjectPaths::clustered_results(job_id),
                    data,
                    WritePrecondition::None,
                )
                .await
                .unwrap();
        }
        let model = Arc::new(ScriptedTextModel::new(responses));
        let synthesizer = InsightSynthesizer::new(
            storage,
            model.clone(),
            pulse_core::PipelineConfig::default(),
        );
        (synthesizer, job_id, model)
    }

    #[tokio::test]
    async fn produces_report_from_representatives() {
        let data = extract(&[
            "1,long hours,-1,True",
            "2,short staffed,0,False",
            "3,short staffed again,0,False",
        ]);
        let (synthesizer, job_id, model) =
            synthesizer_with(Some(data), vec![report_json()]).await;

        let report = synthesizer.synthesize("why burnout?", job_id).await.unwrap();
        assert_eq!(report.insights.len(), 1);
        assert!(!report.summary.is_empty());

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("'why burnout?'"));
        assert!(prompts[0].contains("Cluster 1:"));
        assert!(prompts[0].contains("Cluster 2:"));
        assert!(!prompts[0].contains("Cluster 3:"), "one row per cluster");
    }

    #[tokio::test]
    async fn empty_extract_is_insufficient_data() {
        let (synthesizer, job_id, _) =
            synthesizer_with(Some(extract(&[])), vec![report_json()]).await;
        let err = synthesizer.synthesize("q", job_id).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn two_row_extract_is_insufficient_data() {
        let data = extract(&["1,a,-1,True", "2,b,-1,True"]);
        let (synthesizer, job_id, _) = synthesizer_with(Some(data), vec![report_json()]).await;
        let err = synthesizer.synthesize("q", job_id).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn extract_without_representatives_is_insufficient_data() {
        let data = extract(&["1,a,-1,False", "2,b,-1,False", "3,c,-1,False"]);
        let (synthesizer, job_id, _) = synthesizer_with(Some(data), vec![report_json()]).await;
        let err = synthesizer.synthesize("q", job_id).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[tokio::test]
    async fn malformed_output_gets_one_reask() {
        let data = extract(&["1,a,-1,True", "2,b,0,False", "3,c,1,False"]);
        let (synthesizer, job_id, model) = synthesizer_with(
            Some(data),
            vec!["Here are your insights!".to_string(), report_json()],
        )
        .await;

        let report = synthesizer.synthesize("q", job_id).await.unwrap();
        assert_eq!(report.insights.len(), 1);
        assert_eq!(model.prompts().len(), 2);
    }

    #[tokio::test]
    async fn persistently_malformed_output_fails() {
        let data = extract(&["1,a,-1,True", "2,b,0,False", "3,c,1,False"]);
        let (synthesizer, job_id, model) = synthesizer_with(
            Some(data),
            vec!["not json".to_string(), "{\"summary\": \"no insights key\"}".to_string()],
        )
        .await;

        let err = synthesizer.synthesize("q", job_id).await.unwrap_err();
        assert!(matches!(err, Error::ModelOutput { .. }));
        assert_eq!(model.prompts().len(), 2, "exactly one bounded re-ask");
    }

    #[test]
    fn report_requires_top_level_keys() {
        assert!(parse_report(&report_json()).is_ok());
        assert!(parse_report("{\"insights\": []}").is_err());
        assert!(parse_report("{\"summary\": \"s\"}").is_err());
        assert!(parse_report("plain text").is_err());
    }
}
