//! Google Calendar backed implementation of the calendar ports.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::oauth::{GOOGLE_TOKEN_URL, refresh_access_token};
use crate::agent::{CalendarEvent, CalendarReader, CalendarWriter, NewEvent};
use crate::core::GoogleCredentials;

const GOOGLE_CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Deserialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Event {
    id: String,
    status: Option<String>,
    summary: Option<String>,
    start: EventTime,
    end: EventTime,
}

#[derive(Debug, Deserialize)]
struct ListEventsResponse {
    #[serde(default)]
    items: Vec<Event>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct GoogleCalendar {
    client: Client,
    credentials: GoogleCredentials,
    calendar_id: String,
    api_base: String,
    token_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleCalendar {
    pub fn new(credentials: GoogleCredentials, calendar_id: &str) -> Self {
        Self {
            client: Client::new(),
            credentials,
            calendar_id: calendar_id.to_string(),
            api_base: GOOGLE_CALENDAR_API.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Point the client somewhere other than Google.
    pub fn with_endpoints(mut self, api_base: &str, token_url: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.token_url = token_url.to_string();
        self
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// A valid access token, refreshed a minute before it expires.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref()
            && token.expires_at > now + Duration::seconds(60)
        {
            return Ok(token.access_token.clone());
        }

        let GoogleCredentials {
            client_id,
            client_secret,
            refresh_token,
        } = &self.credentials;
        let oauth =
            refresh_access_token(&self.token_url, client_id, client_secret, refresh_token).await?;
        let expires_at = now + Duration::seconds(oauth.expires_in.unwrap_or(3600));
        let access_token = oauth.access_token.clone();
        *cached = Some(CachedToken {
            access_token: oauth.access_token,
            expires_at,
        });
        tracing::debug!("Refreshed Google access token");
        Ok(access_token)
    }

    async fn list_page(
        &self,
        token: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<ListEventsResponse> {
        let mut query = vec![];
        if let Some(page_token) = page_token {
            query.push(format!("pageToken={}", urlencoding::encode(page_token)));
        }
        query.push(format!(
            "timeMin={}",
            urlencoding::encode(&start.to_rfc3339_opts(SecondsFormat::Secs, true))
        ));
        query.push(format!(
            "timeMax={}",
            urlencoding::encode(&end.to_rfc3339_opts(SecondsFormat::Secs, true))
        ));
        query.push("singleEvents=true".to_string());
        query.push("orderBy=startTime".to_string());
        let url = format!("{}?{}", self.events_url(), query.join("&"));

        let res = self.client.get(&url).bearer_auth(token).send().await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("List events failed: {} ({})", status, text);
        }
        let page: ListEventsResponse = serde_json::from_str(&text)?;
        Ok(page)
    }
}

fn hex_id(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl CalendarReader for GoogleCalendar {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let token = self.access_token().await?;
        let mut events = vec![];
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(&token, start, end, page_token.as_deref())
                .await?;
            for event in page.items {
                if event.status.as_deref() == Some("cancelled") {
                    continue;
                }
                // All day events only carry a date and never block time
                let (Some(start), Some(end)) = (event.start.date_time, event.end.date_time) else {
                    continue;
                };
                events.push(CalendarEvent {
                    id: event.id,
                    title: event.summary.unwrap_or_else(|| "Busy".to_string()),
                    start,
                    end,
                });
            }
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        tracing::debug!(count = events.len(), "Listed Google Calendar events");
        Ok(events)
    }
}

#[async_trait]
impl CalendarWriter for GoogleCalendar {
    async fn create_event(&self, event: &NewEvent) -> Result<String> {
        let token = self.access_token().await?;
        let id = hex_id(&event.idempotency_key);
        let body = json!({
            "id": id,
            "summary": event.title,
            "start": {"dateTime": event.start.to_rfc3339_opts(SecondsFormat::Secs, true)},
            "end": {"dateTime": event.end.to_rfc3339_opts(SecondsFormat::Secs, true)},
        });

        let res = self
            .client
            .post(self.events_url())
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        // The id is derived from the idempotency key so a conflict means
        // an earlier attempt already went through
        if status == StatusCode::CONFLICT {
            tracing::info!("Event {} already exists", id);
            return Ok(id);
        }
        if !status.is_success() {
            anyhow::bail!("Create event failed: {} ({})", status, text);
        }
        let created: CreatedEvent = serde_json::from_str(&text)?;
        Ok(created.id)
    }
}
