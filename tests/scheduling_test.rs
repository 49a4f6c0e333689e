//! End to end scheduling conversations through the HTTP surface

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Datelike, Days, NaiveDateTime, Weekday};
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use scheduler::agent::models::{ReferenceQuery, Relation};
    use scheduler::agent::{Directive, IntentKind, IntentResult};
    use scheduler::time::{DayPart, TimePreference};

    use crate::test_utils::{block, body_to_string, next_business_day, t, test_app};

    async fn create_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/sessions")
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"user_id": "u1", "timezone": "UTC"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn say(app: &Router, id: &str, text: &str) -> Value {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/sessions/{}/messages", id))
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"text": text}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_str(&body_to_string(response.into_body()).await).unwrap()
    }

    fn slot_starts(outcome: &Value) -> Vec<NaiveDateTime> {
        outcome["reply"]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| serde_json::from_value(s["start"].clone()).unwrap())
            .collect()
    }

    fn slot_minutes(outcome: &Value) -> Vec<i64> {
        outcome["reply"]["slots"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| {
                let start: NaiveDateTime = serde_json::from_value(s["start"].clone()).unwrap();
                let end: NaiveDateTime = serde_json::from_value(s["end"].clone()).unwrap();
                (end - start).num_minutes()
            })
            .collect()
    }

    /// A free exact time is offered as the only slot, then booked
    #[tokio::test]
    async fn it_books_a_free_exact_time() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(60);
            m.date = Directive::Change(day);
            m.time = Directive::Change(TimePreference::At(t(14, 0)));
        }));
        let outcome = say(app, &id, "an hour at 2pm").await;
        assert_eq!(outcome["phase"], "suggesting");
        assert_eq!(outcome["reply"]["type"], "suggestions");
        assert_eq!(slot_starts(&outcome), vec![day.and_time(t(14, 0))]);
        assert_eq!(slot_minutes(&outcome), vec![60]);
        assert_eq!(outcome["reply"]["slots"][0]["tag"], "requested");

        test.classifier.push(IntentResult::new(IntentKind::Confirm).with(|m| {
            m.title = Directive::Change("Roadmap".to_string());
        }));
        let outcome = say(app, &id, "book it as Roadmap").await;
        assert_eq!(outcome["phase"], "post_confirmation");
        assert_eq!(outcome["reply"]["type"], "booked");
        assert_eq!(outcome["reply"]["booking"]["title"], "Roadmap");
        assert_eq!(test.calendar.event_count(), 1);
    }

    /// "1 hour before my 5pm Project Review" lands on 15:00-16:00
    #[tokio::test]
    async fn it_schedules_relative_to_a_reference_event() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        block(&test.calendar, "Project Review", day, t(17, 0), t(18, 0));
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(60);
            m.reference = Directive::Change(ReferenceQuery {
                title: Some("Project Review".to_string()),
                time: Some(t(17, 0)),
                day: Some(day),
                offset_minutes: 60,
                relation: Relation::Before,
                previous_booking: false,
            });
        }));
        let outcome = say(app, &id, "an hour before my 5pm project review").await;
        assert_eq!(outcome["reply"]["type"], "suggestions");
        assert_eq!(outcome["reply"]["kind"], "reference");
        assert_eq!(slot_starts(&outcome), vec![day.and_time(t(15, 0))]);
        assert_eq!(outcome["reply"]["slots"][0]["tag"], "reference_derived");
    }

    /// A reference to a meeting that isn't on the calendar asks which one
    #[tokio::test]
    async fn it_asks_when_the_reference_is_missing() {
        let test = test_app().await;
        let app = &test.router;
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(30);
            m.reference = Directive::Change(ReferenceQuery {
                title: Some("Board meeting".to_string()),
                time: None,
                day: None,
                offset_minutes: 0,
                relation: Relation::After,
                previous_booking: false,
            });
        }));
        let outcome = say(app, &id, "right after the board meeting").await;
        assert_eq!(outcome["reply"]["type"], "reference_not_found");
        assert_eq!(outcome["reply"]["title"], "Board meeting");
        assert_eq!(outcome["phase"], "gathering");
    }

    /// Changing the duration throws away the old slots and searches again
    #[tokio::test]
    async fn it_researches_when_the_duration_changes() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        block(&test.calendar, "Standup", day, t(8, 0), t(9, 0));
        block(&test.calendar, "1:1", day, t(11, 0), t(11, 30));
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(30);
            m.date = Directive::Change(day);
            m.time = Directive::Change(TimePreference::Part(DayPart::Morning));
        }));
        let outcome = say(app, &id, "30 minutes in the morning").await;
        assert_eq!(outcome["reply"]["type"], "suggestions");
        assert!(slot_minutes(&outcome).iter().all(|m| *m == 30));

        test.classifier.push(IntentResult::new(IntentKind::Modify).with(|m| {
            m.duration = Directive::Change(60);
        }));
        let outcome = say(app, &id, "actually make it an hour").await;
        assert_eq!(outcome["reply"]["type"], "suggestions");
        let starts = slot_starts(&outcome);
        assert!(!starts.is_empty());
        assert!(slot_minutes(&outcome).iter().all(|m| *m == 60));
        assert!(!starts.contains(&day.and_time(t(10, 30))));
        assert!(!starts.contains(&day.and_time(t(11, 30))));
        for start in starts {
            let end = start + chrono::Duration::minutes(60);
            // Clear of the 1:1 and the standup
            assert!(end <= day.and_time(t(11, 0)) || start >= day.and_time(t(11, 30)));
            assert!(start >= day.and_time(t(9, 0)));
        }
    }

    /// A fully booked horizon ends in a no availability reply
    #[tokio::test]
    async fn it_reports_no_availability() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        for offset in 0..14 {
            let date = day + Days::new(offset);
            block(&test.calendar, "Offsite", date, t(0, 0), t(23, 59));
        }
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(30);
            m.date = Directive::Change(day);
        }));
        let outcome = say(app, &id, "30 minutes that day").await;
        assert_eq!(outcome["reply"]["type"], "no_availability");
        assert_eq!(outcome["phase"], "gathering");
        assert!(outcome["text"].as_str().unwrap().contains("couldn't find any free time"));
    }

    /// After a booking a new request starts over and needs a duration
    #[tokio::test]
    async fn it_soft_resets_after_a_booking() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(30);
            m.date = Directive::Change(day);
            m.time = Directive::Change(TimePreference::At(t(10, 0)));
            m.title = Directive::Change("Sync".to_string());
        }));
        say(app, &id, "30 minute sync at 10").await;
        test.classifier.push(IntentResult::new(IntentKind::Confirm));
        let outcome = say(app, &id, "yes").await;
        assert_eq!(outcome["reply"]["type"], "booked");

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.date = Directive::Change(day);
        }));
        let outcome = say(app, &id, "can you also find time that day").await;
        assert_eq!(outcome["reply"]["type"], "ask_for");
        assert_eq!(outcome["reply"]["field"], "duration");
        assert_eq!(outcome["phase"], "gathering");
    }

    /// With the classifier down the rule-based extractor carries the turn
    #[tokio::test]
    async fn it_falls_back_to_the_extractor() {
        let test = test_app().await;
        let app = &test.router;
        let id = create_session(app).await;

        let outcome = say(app, &id, "30 minutes on Wednesday afternoon").await;
        assert_eq!(outcome["reply"]["type"], "suggestions");
        let starts = slot_starts(&outcome);
        assert!(!starts.is_empty());
        for start in starts {
            assert_eq!(start.weekday(), Weekday::Wed);
            assert!(start.time() >= t(12, 0));
        }
        assert!(slot_minutes(&outcome).iter().all(|m| *m == 30));
    }

    /// Cancelling clears the request and confirming afterwards has
    /// nothing to act on
    #[tokio::test]
    async fn it_cancels_and_has_nothing_to_confirm() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(45);
            m.date = Directive::Change(day);
        }));
        say(app, &id, "45 minutes").await;

        test.classifier.push(IntentResult::new(IntentKind::Cancel));
        let outcome = say(app, &id, "never mind").await;
        assert_eq!(outcome["reply"]["type"], "cancelled");
        assert_eq!(outcome["phase"], "gathering");

        test.classifier.push(IntentResult::new(IntentKind::Confirm));
        let outcome = say(app, &id, "ok book it").await;
        assert_eq!(outcome["reply"]["type"], "nothing_to_confirm");
        assert_eq!(test.calendar.event_count(), 0);
    }

    /// A calendar write failure books nothing and the same slot can be
    /// confirmed again
    #[tokio::test]
    async fn it_keeps_the_slot_when_the_write_fails() {
        let test = test_app().await;
        let app = &test.router;
        let day = next_business_day();
        let id = create_session(app).await;

        test.classifier.push(IntentResult::new(IntentKind::NewRequest).with(|m| {
            m.duration = Directive::Change(30);
            m.date = Directive::Change(day);
            m.time = Directive::Change(TimePreference::At(t(9, 0)));
            m.title = Directive::Change("Hiring sync".to_string());
        }));
        say(app, &id, "hiring sync at 9").await;

        test.calendar.fail_writes(true);
        test.classifier.push(IntentResult::new(IntentKind::Confirm));
        let outcome = say(app, &id, "yes").await;
        assert_eq!(outcome["reply"]["type"], "booking_failed");
        assert_eq!(test.calendar.event_count(), 0);

        test.calendar.fail_writes(false);
        test.classifier.push(IntentResult::new(IntentKind::Confirm));
        let outcome = say(app, &id, "try again").await;
        assert_eq!(outcome["reply"]["type"], "booked");
        assert_eq!(test.calendar.event_count(), 1);
    }
}
