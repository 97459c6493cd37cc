//! The query validation gate.
//!
//! One call to the text-generation endpoint with a closed-world rubric:
//! the model must answer with exactly one token, `Valid` or `Invalid`.
//! Anything else is a contract violation by the model and is treated as
//! `Invalid`. The gate fails closed, with no retry on ambiguous output.

use std::sync::Arc;

use crate::clients::TextModel;
use crate::error::Result;

/// User-facing message when a query is rejected by the gate.
pub const INVALID_QUERY_MESSAGE: &str =
    "Invalid query. Please ask a question about the employee survey.";

/// Outcome of the validation gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The query is in-domain.
    Valid,
    /// The query is out-of-domain or the model broke the one-token contract.
    Invalid,
}

/// Classifies a free-text question as in-domain or out-of-domain.
pub struct QueryValidator {
    model: Arc<dyn TextModel>,
    model_id: String,
}

impl QueryValidator {
    /// Creates a validator using the given model.
    #[must_use]
    pub fn new(model: Arc<dyn TextModel>, model_id: impl Into<String>) -> Self {
        Self {
            model,
            model_id: model_id.into(),
        }
    }

    /// Validates a query against the survey domain.
    ///
    /// # Errors
    ///
    /// Returns an error only if the model endpoint itself is unreachable;
    /// an off-contract answer is mapped to [`Verdict::Invalid`].
    pub async fn validate(&self, query: &str) -> Result<Verdict> {
        let prompt = rubric_prompt(query);
        let answer = self.model.generate(&self.model_id, &prompt).await?;
        let verdict = match answer.trim() {
            "Valid" => Verdict::Valid,
            "Invalid" => Verdict::Invalid,
            other => {
                tracing::warn!(answer = other, "validator model broke one-token contract");
                Verdict::Invalid
            }
        };
        Ok(verdict)
    }
}

/// Renders the fixed instructional prompt embedding the query text.
fn rubric_prompt(query: &str) -> String {
    format!(
        "The user query is: '{query}'. We are building a Q&A bot to analyze feedback from an \
         employee survey. The survey contains multiple columns discussing various aspects of \
         employees, such as sex, gender, employee ID, name, location, ethnicity, comments, \
         views, sentiments, departments, and tenure bands. A query is valid if it relates to \
         any of these demographics or survey data points, such as analyzing feedback, employee \
         sentiments, or identifying trends and insights based on the survey results. This \
         includes queries that focus on specific locations or other demographics. \
         Valid queries are those that ask for analysis of feedback, employee sentiment \
         (positive or negative), key trends, or insights from the survey data. Even if phrased \
         differently, queries that seek information about feedback or analysis related to \
         specific locations or demographics should be considered valid. Examples of valid \
         queries include: 'What are the top insights from the survey?', 'What are the major \
         areas of positive feedback?', 'What is the overall employee sentiment?', or 'What are \
         the most common negative comments?'. \
         Invalid queries are those unrelated to the survey's demographics or feedback data. \
         This includes questions that ask about topics outside the survey, such as external \
         statistics or company policies. For example, queries like 'What is the weather \
         today?' or 'What is the company's financial performance?' would be considered \
         invalid. \
         To summarize: If the query asks for feedback, insights, or analysis related to the \
         survey data, respond with 'Valid'. If it asks for unrelated information, respond \
         with 'Invalid'. The response must be a single word: 'Valid' or 'Invalid'."
    )
}
