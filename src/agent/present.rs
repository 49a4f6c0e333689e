//! Default wording for structured replies. The state machine never
//! produces text itself; the CLI prints this and the HTTP API returns
//! it next to the structured reply.

use std::fmt;
use std::sync::LazyLock;

use handlebars::{Handlebars, handlebars_helper};
use serde_json::{Value, json};

use super::availability::QueryKind;
use super::models::{Field, Slot};
use super::session::Reply;
use super::validate::Clarification;
use crate::time::format_12h;

handlebars_helper!(inc: |v: i64| format!("{}", v + 1));

#[derive(Debug)]
enum Template {
    AskFor,
    PastDate,
    UnrealisticDuration,
    LongDuration,
    Suggestions,
    Nearby,
    Alternatives,
    AskSelection,
    NoAvailability,
    ReferenceNotFound,
    Booked,
    BookingFailed,
    Cancelled,
    NothingToConfirm,
    CalendarUnavailable,
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const SLOT_LIST: &str = "{{#each slots}}{{inc @index}}. {{this}}\n{{/each}}";

const ASK_FOR: &str = "{{question}}";

const PAST_DATE: &str = "That date ({{date}}) has already passed. Did you mean {{suggestion}}?";

const UNREALISTIC_DURATION: &str =
    "{{length}} is longer than I can book in one go. How long should the meeting be?";

const LONG_DURATION: &str = "{{length}} is quite long. Is that correct?";

const SUGGESTIONS: &str = r"{{heading}}
{{> slot_list}}Which one works for you?";

const NEARBY: &str = r"{{requested}} is taken, but these are close:
{{> slot_list}}Would one of these work?";

const ALTERNATIVES: &str = r"Nothing fits that exactly. The closest openings are:
{{> slot_list}}Should I book one of them?";

const ASK_SELECTION: &str = r"Which one should I book?
{{> slot_list}}";

const NO_AVAILABILITY: &str = "I couldn't find any free time in the next few days. \
Want to try a different day or a shorter meeting?";

const REFERENCE_NOT_FOUND: &str = r#"{{#if title}}I couldn't find "{{title}}" on your calendar.{{else}}I couldn't find the meeting you mean.{{/if}} Which meeting should I schedule around?"#;

const BOOKED: &str = r#"Booked "{{title}}" for {{when}}."#;

const BOOKING_FAILED: &str =
    "I couldn't add that to your calendar ({{reason}}). Nothing was booked, confirm again to retry.";

const CANCELLED: &str = "Okay, I've cleared that. Anything else you'd like to schedule?";

const NOTHING_TO_CONFIRM: &str =
    "There's nothing to confirm yet. What would you like to schedule?";

const CALENDAR_UNAVAILABLE: &str =
    "I can't check your calendar right now. Please try again in a moment.";

fn templates() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Plain text output, titles are shown as typed
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("inc", Box::new(inc));
    registry
        .register_partial("slot_list", SLOT_LIST)
        .expect("Failed to register partial");
    for (name, template) in [
        (Template::AskFor, ASK_FOR),
        (Template::PastDate, PAST_DATE),
        (Template::UnrealisticDuration, UNREALISTIC_DURATION),
        (Template::LongDuration, LONG_DURATION),
        (Template::Suggestions, SUGGESTIONS),
        (Template::Nearby, NEARBY),
        (Template::Alternatives, ALTERNATIVES),
        (Template::AskSelection, ASK_SELECTION),
        (Template::NoAvailability, NO_AVAILABILITY),
        (Template::ReferenceNotFound, REFERENCE_NOT_FOUND),
        (Template::Booked, BOOKED),
        (Template::BookingFailed, BOOKING_FAILED),
        (Template::Cancelled, CANCELLED),
        (Template::NothingToConfirm, NOTHING_TO_CONFIRM),
        (Template::CalendarUnavailable, CALENDAR_UNAVAILABLE),
    ] {
        registry
            .register_template_string(&name.to_string(), template)
            .expect("Failed to register template");
    }
    registry
}

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(templates);

fn question(field: Field) -> String {
    match field {
        Field::Duration => "How long should the meeting be?".to_string(),
        Field::Date => "Which day works for you?".to_string(),
        Field::Time => "What time would you like?".to_string(),
        Field::Title => "What should I call the meeting?".to_string(),
        other => format!("Could you tell me more about the {}?", other.as_str().replace('_', " ")),
    }
}

fn length(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{} minutes", m),
        (1, 0) => "1 hour".to_string(),
        (h, 0) => format!("{} hours", h),
        (h, m) => format!("{} hours {} minutes", h, m),
    }
}

fn labels(slots: &[Slot]) -> Vec<String> {
    slots.iter().map(Slot::label).collect()
}

pub fn render(reply: &Reply) -> String {
    let (template, data): (Template, Value) = match reply {
        Reply::AskFor { field } => (Template::AskFor, json!({ "question": question(*field) })),
        Reply::Clarify { reason } => match reason {
            Clarification::PastDate { date, suggestion } => (
                Template::PastDate,
                json!({
                    "date": date.format("%B %-d").to_string(),
                    "suggestion": suggestion.format("%A, %B %-d").to_string(),
                }),
            ),
            Clarification::UnrealisticDuration { minutes } => (
                Template::UnrealisticDuration,
                json!({ "length": length(*minutes) }),
            ),
            Clarification::LongDuration { minutes } => {
                (Template::LongDuration, json!({ "length": length(*minutes) }))
            }
        },
        Reply::Suggestions { kind, slots } => {
            let heading = match kind {
                QueryKind::Reference => "That window is free:",
                QueryKind::MultiDay => "Here are some openings over the next few days:",
                QueryKind::SingleDay => "Here's what's open:",
            };
            (
                Template::Suggestions,
                json!({ "heading": heading, "slots": labels(slots) }),
            )
        }
        Reply::Nearby { requested, slots } => (
            Template::Nearby,
            json!({
                "requested": format_12h(requested.time()),
                "slots": labels(slots),
            }),
        ),
        Reply::Alternatives { slots } => (Template::Alternatives, json!({ "slots": labels(slots) })),
        Reply::AskSelection { slots } => (Template::AskSelection, json!({ "slots": labels(slots) })),
        Reply::NoAvailability => (Template::NoAvailability, json!({})),
        Reply::ReferenceNotFound { title } => (Template::ReferenceNotFound, json!({ "title": title })),
        Reply::Booked { booking } => (
            Template::Booked,
            json!({ "title": booking.title, "when": booking.slot().label() }),
        ),
        Reply::BookingFailed { reason } => (Template::BookingFailed, json!({ "reason": reason })),
        Reply::Cancelled => (Template::Cancelled, json!({})),
        Reply::NothingToConfirm => (Template::NothingToConfirm, json!({})),
        Reply::CalendarUnavailable => (Template::CalendarUnavailable, json!({})),
    };
    TEMPLATES
        .render(&template.to_string(), &data)
        .unwrap_or_else(|e| {
            tracing::error!("Failed to render {} reply: {}", template, e);
            "Sorry, something went wrong on my end.".to_string()
        })
}
