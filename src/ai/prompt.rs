//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. This is ideal since output
//! from LLMs should be considered untrusted and Handlebars forces you
//! to add only what you need.

use std::fmt;

use handlebars::Handlebars;

#[derive(Debug)]
pub enum Prompt {
    IntentClassifier,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// Implement the Into trait so that Prompt can be converted to an &str
impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const INTENT_CLASSIFIER_PROMPT: &str = r#"
You read one message from a conversation about booking a meeting and describe what the user wants as a JSON object. Reply with the JSON object only.

Today is {{weekday}} {{today}}. All dates and times are in {{timezone}} and use 24-hour HH:MM.
{{#if booking_completed}}
A booking was just completed. A new scheduling request starts from scratch and does not inherit anything from it.
{{/if}}
{{#if previous_booking}}
Most recent booking: "{{previous_booking.title}}" on {{previous_booking.date}} at {{previous_booking.start}} for {{previous_booking.duration}} minutes. When the user points at it ("after that meeting") set reference.previous_booking to true.
{{/if}}

# Calendar
{{calendar}}

# Parameters collected so far
{{params}}

# Slots offered last turn
{{#each candidates}}
{{@index}}: {{this}}
{{else}}
None
{{/each}}

# Output
{
  "kind": "new_request" | "modify" | "confirm" | "cancel",
  "modifications": {
    "<field>": {"action": "keep"} | {"action": "change", "value": <value>} | {"action": "clear"}
  },
  "missing": ["<field>", ...],
  "next_action": "<a few words on what to ask or do next>"
}

Fields and their values:
- duration: length in minutes, integer
- date: "YYYY-MM-DD"
- time: "HH:MM", or one of "morning", "afternoon", "evening", "night"
- title: string
- reference: {"title": string or null, "time": "HH:MM" or null, "day": "YYYY-MM-DD" or null, "offset_minutes": integer, "relation": "before" or "after", "previous_booking": boolean}
- constraints: {"excluded_dates": ["YYYY-MM-DD"], "excluded_weekdays": ["Mon", ...], "earliest": "HH:MM" or null, "latest": "HH:MM" or null}
- search_range: {"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}
- buffer: {"minutes": integer, "side": "after_last_event" or "before_next_event"}
- selection: index of the chosen slot in the list above, starting at 0

Rules:
- Only include fields this message changes. Omitted fields are kept.
- Use "clear" when the user takes something back ("any day is fine" clears date).
- Resolve relative days ("tomorrow", "next Friday") against today.
- Convert times given in another timezone to {{timezone}}.
- "not too early" means constraints.earliest "10:00". "not too late" means constraints.latest "17:00".
- "next week" is a search_range from Monday to Friday of next week.
- A meeting relative to another event ("an hour before my 5pm meeting") is a reference, not a time. The offset is the gap between the two meetings, not the duration.
- Use "confirm" only when the user accepts an offered slot or names one of them. Put the choice in selection when there is more than one.
- Use "cancel" when the user wants to stop or start over.
- Use "new_request" for a fresh scheduling request and "modify" when the user adjusts the current one.
"#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::IntentClassifier.to_string(), INTENT_CLASSIFIER_PROMPT)
        .expect("Failed to register template");
    registry
}
