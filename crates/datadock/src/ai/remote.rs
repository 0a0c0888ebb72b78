//! Chat-completions schema inference. Sends column headers plus a small
//! row sample to an OpenRouter-compatible endpoint and parses the JSON
//! schema proposal out of the reply.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::InferenceError;
use crate::reader::TableData;
use crate::schema::{canonicalize_column, ColumnSchema, ColumnType};

use super::{InferredSchema, SchemaInference};

/// Rows included in the prompt.
const PROMPT_SAMPLE_ROWS: usize = 20;

/// Upper bound on prompt payload characters.
const PROMPT_CHAR_LIMIT: usize = 4000;

pub struct RemoteInference {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Schema JSON the model is asked to produce.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSchema {
    table_name: String,
    columns: Vec<RemoteColumn>,
    #[serde(default)]
    period_column: Option<String>,
    #[serde(default = "default_has_header")]
    has_header_row: bool,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteColumn {
    name: String,
    #[serde(default)]
    data_type: Option<ColumnType>,
}

fn default_has_header() -> bool {
    true
}

fn default_confidence() -> f32 {
    0.5
}

impl RemoteInference {
    pub fn new(config: &AiConfig) -> Result<Self, InferenceError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            InferenceError::RequestFailed(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn build_prompt(&self, table: &TableData) -> String {
        let mut sample = String::new();
        for row in table.records.iter().take(PROMPT_SAMPLE_ROWS) {
            sample.push_str(&row.join(","));
            sample.push('\n');
            if sample.len() > PROMPT_CHAR_LIMIT {
                break;
            }
        }
        let sample: String = sample.chars().take(PROMPT_CHAR_LIMIT).collect();

        format!(
            r#"Analyze this delimited data sample from the file "{file}" and propose a storage schema.
Respond ONLY with valid JSON in this exact shape:
{{
  "tableName": "snake_case_name",
  "columns": [{{"name": "snake_case_name", "dataType": "text|integer|float|boolean|date"}}],
  "periodColumn": "name of the column holding the reporting period, or null",
  "hasHeaderRow": true,
  "confidence": 0.0
}}

Rules:
- tableName and column names must be lowercase snake_case
- columns must appear in the same order as the data
- periodColumn must be one of the column names or null
- confidence is your estimate between 0.0 and 1.0

Data sample:
{sample}"#,
            file = table.file_name,
            sample = sample,
        )
    }

    fn call_endpoint(&self, prompt: &str) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a data engineering assistant that proposes table schemas. Respond only with JSON.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            max_tokens: 1024,
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| InferenceError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::RequestFailed(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;
        let choice = parsed.choices.into_iter().next().ok_or(InferenceError::EmptyResponse)?;
        if choice.message.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(choice.message.content)
    }

    fn parse_response(&self, table: &TableData, response: &str) -> Result<InferredSchema, InferenceError> {
        let json = extract_json(response);
        let remote: RemoteSchema = serde_json::from_str(&json)
            .map_err(|e| InferenceError::InvalidResponse(format!("{e}; response was: {json}")))?;

        if remote.columns.is_empty() {
            return Err(InferenceError::InvalidResponse(
                "schema proposal has no columns".to_string(),
            ));
        }

        let columns: Vec<ColumnSchema> = remote
            .columns
            .into_iter()
            .map(|c| ColumnSchema::new(c.name, c.data_type.unwrap_or(ColumnType::Text)))
            .collect();
        if columns.iter().any(|c| c.name.is_empty()) {
            return Err(InferenceError::InvalidResponse(
                "schema proposal contains an unusable column name".to_string(),
            ));
        }

        let table_name = canonicalize_column(&remote.table_name);
        if table_name.is_empty() {
            return Err(InferenceError::InvalidResponse(
                "schema proposal has an unusable table name".to_string(),
            ));
        }

        // A period column the proposal does not actually declare is dropped.
        let period_column = remote
            .period_column
            .map(|p| canonicalize_column(&p))
            .filter(|p| columns.iter().any(|c| &c.name == p));

        debug!(
            "remote schema proposal for '{}': table '{}', {} columns",
            table.file_name,
            table_name,
            columns.len()
        );

        Ok(InferredSchema {
            table_name,
            columns,
            period_column,
            has_header_row: remote.has_header_row,
            confidence: remote.confidence.clamp(0.0, 1.0),
        })
    }
}

impl SchemaInference for RemoteInference {
    fn infer(&self, table: &TableData) -> Result<InferredSchema, InferenceError> {
        let prompt = self.build_prompt(table);
        debug!("inference prompt:\n{prompt}");
        let response = self.call_endpoint(&prompt)?;
        debug!("inference response:\n{response}");
        self.parse_response(table, &response)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Extracts the first balanced JSON object from `response`, tracking string
/// boundaries and escape sequences so braces inside values do not end the
/// scan early.
fn extract_json(response: &str) -> String {
    let start = match response.find('{') {
        Some(idx) => idx,
        None => return response.to_string(),
    };

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = response.len();

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    response[start..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_strips_surrounding_prose() {
        let response = r#"Here is the schema:
{"tableName": "sales", "columns": [{"name": "year", "dataType": "integer"}]}
Let me know if you need anything else."#;
        let json = extract_json(response);
        assert!(json.starts_with('{'));
        assert!(json.ends_with('}'));
        let parsed: RemoteSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.table_name, "sales");
    }

    #[test]
    fn test_extract_json_handles_braces_inside_strings() {
        let response = r#"{"tableName": "odd{name}", "columns": [{"name": "a"}]}"#;
        let json = extract_json(response);
        assert_eq!(json, response);
    }

    #[test]
    #[serial_test::serial]
    fn test_new_requires_api_key_env() {
        let config = AiConfig {
            api_key_env: "DATADOCK_TEST_API_KEY".to_string(),
            ..Default::default()
        };
        std::env::remove_var(&config.api_key_env);
        let err = RemoteInference::new(&config).unwrap_err();
        assert!(matches!(err, InferenceError::RequestFailed(_)));

        std::env::set_var(&config.api_key_env, "test-key");
        assert!(RemoteInference::new(&config).is_ok());
        std::env::remove_var(&config.api_key_env);
    }

    #[test]
    fn test_remote_schema_defaults_apply() {
        let json = r#"{"tableName": "t", "columns": [{"name": "a"}]}"#;
        let parsed: RemoteSchema = serde_json::from_str(json).unwrap();
        assert!(parsed.has_header_row);
        assert_eq!(parsed.confidence, 0.5);
        assert!(parsed.period_column.is_none());
        assert!(parsed.columns[0].data_type.is_none());
    }
}
