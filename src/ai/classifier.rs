//! Intent classification backed by a chat completion model.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::prompt::{Prompt, templates};
use crate::agent::models::{ChatMessage, Speaker};
use crate::agent::{ClassifyRequest, IntentClassifier, IntentResult, SchedulerError, Slot};
use crate::openai::{Message, ResponseFormat, Role, completion, completion_content};

#[derive(Clone, Debug)]
pub struct LlmClassifier {
    api_hostname: String,
    api_key: String,
    model: String,
}

impl LlmClassifier {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

fn system_prompt(request: &ClassifyRequest<'_>) -> Result<String, SchedulerError> {
    let previous_booking = match request.previous_booking {
        Some(booking) => json!({
            "title": booking.title,
            "date": booking.date.format("%Y-%m-%d").to_string(),
            "start": booking.start.format("%H:%M").to_string(),
            "duration": booking.duration,
        }),
        None => Value::Null,
    };
    let params = serde_json::to_string_pretty(request.params)
        .map_err(|e| SchedulerError::ClassifierMalformed(e.to_string()))?;
    let candidates: Vec<String> = request.candidates.iter().map(Slot::label).collect();
    let data = json!({
        "weekday": request.today.format("%A").to_string(),
        "today": request.today.format("%Y-%m-%d").to_string(),
        "timezone": request.timezone.name(),
        "booking_completed": request.booking_completed,
        "previous_booking": previous_booking,
        "calendar": request.calendar_summary,
        "params": params,
        "candidates": candidates,
    });
    templates()
        .render(&Prompt::IntentClassifier.to_string(), &data)
        .map_err(|e| SchedulerError::ClassifierUnavailable(format!("prompt: {}", e)))
}

fn to_message(message: &ChatMessage) -> Message {
    let role = match message.speaker {
        Speaker::User => Role::User,
        Speaker::Assistant => Role::Assistant,
    };
    Message::new(role, &message.text)
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(
        &self,
        request: &ClassifyRequest<'_>,
    ) -> Result<IntentResult, SchedulerError> {
        let mut messages = vec![Message::new(Role::System, &system_prompt(request)?)];
        messages.extend(request.history.iter().map(to_message));
        messages.push(Message::new(Role::User, request.message));

        let resp = completion(
            &messages,
            ResponseFormat::JsonObject,
            &self.api_hostname,
            &self.api_key,
            &self.model,
        )
        .await
        .map_err(|e| SchedulerError::ClassifierUnavailable(e.to_string()))?;

        let content = completion_content(&resp).ok_or_else(|| {
            SchedulerError::ClassifierMalformed("completion has no content".to_string())
        })?;
        tracing::debug!("Classifier output: {}", content);
        IntentResult::from_json(content)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono_tz::Tz;

    use super::*;
    use crate::agent::{BookingRecord, Directive, IntentKind, Parameters};

    fn completion_body(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    fn request<'a>(
        params: &'a Parameters,
        booking: Option<&'a BookingRecord>,
    ) -> ClassifyRequest<'a> {
        ClassifyRequest {
            history: &[],
            params,
            candidates: &[],
            calendar_summary: "No events.",
            message: "30 minutes tomorrow afternoon",
            today: NaiveDate::from_ymd_opt(2025, 11, 13).unwrap(),
            timezone: Tz::America__New_York,
            previous_booking: booking,
            booking_completed: booking.is_some(),
        }
    }

    #[test]
    fn test_system_prompt_includes_context() {
        let params = Parameters::default();
        let booking = BookingRecord {
            title: "Design review".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 11, 13).unwrap(),
            start: chrono::NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            duration: 45,
            event_id: "evt".to_string(),
        };
        let prompt = system_prompt(&request(&params, Some(&booking))).unwrap();
        assert!(prompt.contains("Today is Thursday 2025-11-13"));
        assert!(prompt.contains("America/New_York"));
        assert!(prompt.contains("\"Design review\" on 2025-11-13 at 14:00 for 45 minutes"));
        assert!(prompt.contains("A booking was just completed."));

        let without = system_prompt(&request(&params, None)).unwrap();
        assert!(!without.contains("Most recent booking"));
    }

    #[tokio::test]
    async fn test_classify_parses_model_output() {
        let mut server = mockito::Server::new_async().await;
        let content = r#"{"kind": "new_request", "modifications": {"duration": {"action": "change", "value": 30}}}"#;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(content))
            .create_async()
            .await;

        let classifier = LlmClassifier::new(&server.url(), "test-key", "test-model");
        let params = Parameters::default();
        let intent = classifier.classify(&request(&params, None)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(intent.kind, IntentKind::NewRequest);
        assert_eq!(intent.modifications.duration, Directive::Change(30));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let classifier = LlmClassifier::new(&server.url(), "test-key", "test-model");
        let params = Parameters::default();
        let err = classifier.classify(&request(&params, None)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ClassifierUnavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_garbage_output_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body("sure, booking it now!"))
            .create_async()
            .await;

        let classifier = LlmClassifier::new(&server.url(), "test-key", "test-model");
        let params = Parameters::default();
        let err = classifier.classify(&request(&params, None)).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ClassifierMalformed(_)), "{err:?}");
    }
}
