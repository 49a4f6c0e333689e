use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_time_or(key: &str, default: (u32, u32)) -> NaiveTime {
    env::var(key)
        .ok()
        .and_then(|v| NaiveTime::parse_from_str(v.trim(), "%H:%M").ok())
        .or_else(|| NaiveTime::from_hms_opt(default.0, default.1, 0))
        .unwrap_or(NaiveTime::MIN)
}

/// Tunables for slot search. The defaults are product choices; every
/// one of them can be overridden from the environment.
#[derive(Clone, Debug)]
pub struct SearchSettings {
    pub day_start: NaiveTime,
    pub day_end: NaiveTime,
    pub step_minutes: u32,
    pub suggestion_cap: usize,
    pub multi_day_cap: usize,
    pub alternative_cap: usize,
    /// Business days scanned when no date range is given.
    pub horizon_days: usize,
    pub fuzzy_window_minutes: u32,
    /// Durations from here up get a "is that correct?" first.
    pub long_duration_minutes: u32,
    /// Durations above this are not searched at all.
    pub max_duration_minutes: u32,
    pub history_window: usize,
    pub snapshot_window_days: i64,
    pub read_attempts: u32,
    pub read_backoff: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            day_start: env_time_or("SCHEDULER_DAY_START", (8, 0)),
            day_end: env_time_or("SCHEDULER_DAY_END", (18, 0)),
            step_minutes: env_or("SCHEDULER_SLOT_STEP_MINS", 30),
            suggestion_cap: env_or("SCHEDULER_SUGGESTION_CAP", 3),
            multi_day_cap: env_or("SCHEDULER_MULTI_DAY_CAP", 6),
            alternative_cap: env_or("SCHEDULER_ALTERNATIVE_CAP", 3usize).min(3),
            horizon_days: env_or("SCHEDULER_HORIZON_DAYS", 5),
            fuzzy_window_minutes: env_or("SCHEDULER_FUZZY_WINDOW_MINS", 30),
            long_duration_minutes: env_or("SCHEDULER_LONG_DURATION_MINS", 240),
            max_duration_minutes: env_or("SCHEDULER_MAX_DURATION_MINS", 480),
            history_window: env_or("SCHEDULER_HISTORY_WINDOW", 10),
            snapshot_window_days: env_or("SCHEDULER_SNAPSHOT_WINDOW_DAYS", 20),
            read_attempts: env_or("SCHEDULER_CALENDAR_READ_ATTEMPTS", 3u32).max(1),
            read_backoff: Duration::from_millis(env_or("SCHEDULER_CALENDAR_BACKOFF_MS", 200)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub timezone: Tz,
    pub google: Option<GoogleCredentials>,
    pub calendar_id: String,
    pub classifier_timeout: Duration,
    pub calendar_timeout: Duration,
    pub session_ttl: Duration,
    pub search: SearchSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        let openai_api_hostname = env::var("SCHEDULER_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_model =
            env::var("SCHEDULER_LLM_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());
        let timezone = env::var("SCHEDULER_TIMEZONE")
            .ok()
            .and_then(|name| crate::time::parse_timezone(&name))
            .unwrap_or(Tz::UTC);

        // Only talk to Google when all three are present
        let google = match (
            env::var("SCHEDULER_GOOGLE_CLIENT_ID"),
            env::var("SCHEDULER_GOOGLE_CLIENT_SECRET"),
            env::var("SCHEDULER_GOOGLE_REFRESH_TOKEN"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(refresh_token)) => Some(GoogleCredentials {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => None,
        };
        let calendar_id =
            env::var("SCHEDULER_CALENDAR_ID").unwrap_or_else(|_| "primary".to_string());

        Self {
            openai_api_hostname,
            openai_api_key,
            openai_model,
            timezone,
            google,
            calendar_id,
            classifier_timeout: Duration::from_secs(env_or("SCHEDULER_CLASSIFIER_TIMEOUT_SECS", 5)),
            calendar_timeout: Duration::from_secs(env_or("SCHEDULER_CALENDAR_TIMEOUT_SECS", 5)),
            session_ttl: Duration::from_secs(60 * env_or("SCHEDULER_SESSION_TTL_MINS", 30)),
            search: SearchSettings::default(),
        }
    }
}
