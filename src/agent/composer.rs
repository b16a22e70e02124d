//! Turns query outcomes into prose answers.

use crate::llm::TextModel;
use crate::models::ExecutionOutcome;
use tracing::warn;

/// Rows shown to the model when writing the answer.
pub const MAX_PROMPT_ROWS: usize = 50;

/// Executions slower than this get a note appended to the answer.
pub const SLOW_QUERY_MS: u64 = 1000;

pub const NO_DATA_MESSAGE: &str = "I couldn't find any data matching your question. The query ran successfully but returned no results.";

pub fn failure_message(error: &str) -> String {
    format!(
        "I apologize, but I encountered an error while retrieving the data: {}",
        error
    )
}

fn build_prompt(question: &str, sql: &str, outcome: &ExecutionOutcome) -> String {
    let shown = outcome.rows.len().min(MAX_PROMPT_ROWS);
    let data = serde_json::to_string_pretty(&outcome.rows[..shown]).unwrap_or_default();
    let mut prompt = format!(
        "Answer the user's question using only the data below. Do not invent values \
         that are not in the data. Be concise and use plain business language.\n\
         \n\
         Question: {}\n\
         SQL used: {}\n\
         Rows returned: {}\n\
         Data:\n{}\n",
        question, sql, outcome.row_count, data
    );
    if outcome.row_count > shown {
        prompt.push_str(&format!(
            "\nOnly the first {} of {} rows are shown.\n",
            shown, outcome.row_count
        ));
    }
    if outcome.truncated {
        prompt.push_str(&format!(
            "\nThe query hit the {} row cap, so the full result is larger than shown. \
             Say that the numbers may be incomplete.\n",
            outcome.row_count
        ));
    }
    prompt
}

/// Write the final answer for a question.
pub async fn compose(
    model: &dyn TextModel,
    question: &str,
    sql: &str,
    outcome: &ExecutionOutcome,
) -> String {
    if !outcome.success {
        return failure_message(outcome.error_message().unwrap_or("unknown error"));
    }
    if outcome.row_count == 0 {
        return NO_DATA_MESSAGE.to_string();
    }

    let mut answer = match model.generate(&build_prompt(question, sql, outcome)).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Response composition failed, using plain summary");
            format!(
                "I found {} record(s) for your question, but I couldn't generate a detailed summary right now.",
                outcome.row_count
            )
        }
    };

    if outcome.execution_time_ms > SLOW_QUERY_MS {
        answer.push_str(&format!(
            "\n\n(Note: this query took {:.1} seconds to run.)",
            outcome.execution_time_ms as f64 / 1000.0
        ));
    }
    answer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AgentError, AgentResult};
    use crate::models::JsonRow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoModel {
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TextModel for EchoModel {
        async fn generate(&self, prompt: &str) -> AgentResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                Err(AgentError::rate_limited("slow down"))
            } else {
                Ok("There are 3 companies.".to_string())
            }
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn model(fail: bool) -> EchoModel {
        EchoModel {
            prompts: Mutex::new(Vec::new()),
            fail,
        }
    }

    fn rows(n: usize) -> Vec<JsonRow> {
        (0..n)
            .map(|i| {
                let mut row = JsonRow::new();
                row.insert("id".to_string(), json!(i));
                row
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failure_message_skips_model() {
        let m = model(false);
        let err = AgentError::validation("bad");
        let outcome = ExecutionOutcome::failed("SELECT 1", &err, 1);
        let answer = compose(&m, "q", "SELECT 1", &outcome).await;
        assert_eq!(answer, failure_message("bad"));
        assert!(m.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_rows_message() {
        let m = model(false);
        let outcome = ExecutionOutcome::succeeded("SELECT 1", Vec::new(), 1, false);
        assert_eq!(compose(&m, "q", "SELECT 1", &outcome).await, NO_DATA_MESSAGE);
    }

    #[tokio::test]
    async fn test_prompt_capped_at_fifty_rows() {
        let m = model(false);
        let outcome = ExecutionOutcome::succeeded("SELECT id FROM t", rows(60), 5, false);
        let answer = compose(&m, "list ids", "SELECT id FROM t", &outcome).await;
        assert_eq!(answer, "There are 3 companies.");
        let prompts = m.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"id\": 49"));
        assert!(!prompts[0].contains("\"id\": 50"));
        assert!(prompts[0].contains("first 50 of 60 rows"));
    }

    #[tokio::test]
    async fn test_truncated_result_flagged_in_prompt() {
        let m = model(false);
        let outcome =
            ExecutionOutcome::succeeded("SELECT id FROM t", rows(3), 5, false).with_truncated(true);
        compose(&m, "list ids", "SELECT id FROM t", &outcome).await;
        let prompts = m.prompts.lock().unwrap();
        assert!(prompts[0].contains("row cap"));
        assert!(prompts[0].contains("may be incomplete"));
    }

    #[tokio::test]
    async fn test_model_failure_degrades_with_slow_note() {
        let m = model(true);
        let outcome = ExecutionOutcome::succeeded("SELECT 1", rows(2), 2500, false);
        let answer = compose(&m, "q", "SELECT 1", &outcome).await;
        assert!(answer.starts_with("I found 2 record(s)"));
        assert!(answer.contains("took 2.5 seconds"));
    }
}
