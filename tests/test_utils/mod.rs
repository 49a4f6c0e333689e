//! Test utilities for integration tests
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, body::Body};
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;

use scheduler::agent::{
    ClassifyRequest, IntentClassifier, IntentResult, SchedulerError, Scheduler, SessionRegistry,
};
use scheduler::api::{AppState, app};
use scheduler::calendar::MemoryCalendar;
use scheduler::core::{AppConfig, SearchSettings};
use scheduler::time::{is_business_day, to_utc};

/// Hands out canned intents in order. Once the script runs out every
/// call fails, which sends the turn to the rule-based extractor.
#[derive(Default)]
pub struct ScriptedClassifier {
    intents: Mutex<VecDeque<IntentResult>>,
}

impl ScriptedClassifier {
    pub fn push(&self, intent: IntentResult) {
        self.intents.lock().unwrap().push_back(intent);
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, _: &ClassifyRequest<'_>) -> Result<IntentResult, SchedulerError> {
        self.intents
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SchedulerError::ClassifierUnavailable("script exhausted".to_string()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub classifier: Arc<ScriptedClassifier>,
    pub calendar: Arc<MemoryCalendar>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        openai_api_hostname: String::from("http://localhost:0"),
        openai_api_key: String::from("test-api-key"),
        openai_model: String::from("gpt-4.1-mini"),
        timezone: Tz::UTC,
        google: None,
        calendar_id: String::from("primary"),
        classifier_timeout: Duration::from_millis(200),
        calendar_timeout: Duration::from_millis(200),
        session_ttl: Duration::from_secs(60),
        search: SearchSettings {
            read_backoff: Duration::from_millis(1),
            ..SearchSettings::default()
        },
    }
}

/// Creates a test application router backed by an in-memory calendar
/// and a scripted classifier.
pub async fn test_app() -> TestApp {
    let config = test_config();
    let classifier = Arc::new(ScriptedClassifier::default());
    let calendar = Arc::new(MemoryCalendar::default());
    let scheduler = Arc::new(
        Scheduler::new(
            classifier.clone(),
            calendar.clone(),
            calendar.clone(),
            config.search.clone(),
        )
        .with_timeouts(config.classifier_timeout, config.calendar_timeout),
    );
    let registry = Arc::new(SessionRegistry::new(scheduler, config.session_ttl));
    let app_state = AppState::new(config, registry);

    TestApp {
        router: app(Arc::new(RwLock::new(app_state))),
        classifier,
        calendar,
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// The first business day after today.
pub fn next_business_day() -> NaiveDate {
    let mut day = Utc::now().date_naive() + Days::new(1);
    while !is_business_day(day) {
        day = day + Days::new(1);
    }
    day
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn block(calendar: &MemoryCalendar, title: &str, date: NaiveDate, from: NaiveTime, to: NaiveTime) {
    calendar.add_event(
        title,
        to_utc(date.and_time(from), Tz::UTC),
        to_utc(date.and_time(to), Tz::UTC),
    );
}
