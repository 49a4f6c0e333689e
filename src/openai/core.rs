use std::time::Duration;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
        }
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}

/// Shape the model is asked to answer in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON mode: the reply is guaranteed to parse as a JSON object.
    JsonObject,
}

impl ResponseFormat {
    fn as_json(&self) -> Value {
        match self {
            ResponseFormat::Text => json!({"type": "text"}),
            ResponseFormat::JsonObject => json!({"type": "json_object"}),
        }
    }
}

pub async fn completion(
    messages: &[Message],
    response_format: ResponseFormat,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let payload = json!({
        "model": model,
        "messages": messages,
        "response_format": response_format.as_json(),
        "temperature": 0,
    });
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response)
}

/// Text of the first choice in a chat completion response.
pub fn completion_content(response: &Value) -> Option<&str> {
    response["choices"][0]["message"]["content"].as_str()
}
