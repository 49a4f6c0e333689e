//! The structured result the intent classifier hands back each turn.
//! The schema is strict: anything that does not deserialize into
//! `IntentResult` is rejected and the turn falls back to the rule-based
//! extractor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::SchedulerError;
use super::models::{Buffer, Constraints, Field, ReferenceQuery};
use crate::time::{DateRange, TimePreference};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    NewRequest,
    Modify,
    Confirm,
    Cancel,
}

/// What to do with one parameter this turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum Directive<T> {
    Keep,
    Change(T),
    Clear,
}

impl<T> Default for Directive<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> Directive<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn changed(&self) -> Option<&T> {
        match self {
            Self::Change(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Modifications {
    pub duration: Directive<u32>,
    pub date: Directive<NaiveDate>,
    pub time: Directive<TimePreference>,
    pub title: Directive<String>,
    pub reference: Directive<ReferenceQuery>,
    pub constraints: Directive<Constraints>,
    pub search_range: Directive<DateRange>,
    pub buffer: Directive<Buffer>,
    pub selection: Directive<usize>,
}

impl Modifications {
    pub fn is_all_keep(&self) -> bool {
        self == &Modifications::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentResult {
    pub kind: IntentKind,
    #[serde(default)]
    pub modifications: Modifications,
    /// Advisory only, the state machine does its own readiness check.
    #[serde(default)]
    pub missing: Vec<Field>,
    #[serde(default)]
    pub next_action: Option<String>,
}

impl IntentResult {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            modifications: Modifications::default(),
            missing: vec![],
            next_action: None,
        }
    }

    pub fn with(mut self, f: impl FnOnce(&mut Modifications)) -> Self {
        f(&mut self.modifications);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, SchedulerError> {
        serde_json::from_str(raw).map_err(|e| SchedulerError::ClassifierMalformed(e.to_string()))
    }
}
