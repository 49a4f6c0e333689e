//! Requirement merger: folds one turn's intent into the working
//! parameters. Pure, so the same inputs always give the same output.

use super::error::SchedulerError;
use super::intent::{Directive, IntentKind, IntentResult};
use super::models::{Param, Parameters, Slot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merged {
    pub params: Parameters,
    /// Previously computed slots no longer answer the request.
    pub invalidated: bool,
}

fn apply<T: Clone>(current: &Param<T>, directive: &Directive<T>) -> Param<T> {
    match directive {
        Directive::Keep => current.clone(),
        Directive::Change(v) => Param::Set(v.clone()),
        Directive::Clear => Param::Cleared,
    }
}

fn moved<T: PartialEq>(before: &Param<T>, after: &Param<T>) -> bool {
    before.value() != after.value()
}

pub fn merge(
    current: &Parameters,
    intent: &IntentResult,
    candidates: &[Slot],
) -> Result<Merged, SchedulerError> {
    match intent.kind {
        IntentKind::Cancel => {
            return Ok(Merged {
                params: Parameters::default(),
                invalidated: true,
            });
        }
        IntentKind::Confirm if candidates.is_empty() => {
            return Err(SchedulerError::NoCandidateToConfirm);
        }
        _ => {}
    }

    let m = &intent.modifications;
    let params = Parameters {
        duration: apply(&current.duration, &m.duration),
        date: apply(&current.date, &m.date),
        time: apply(&current.time, &m.time),
        title: apply(&current.title, &m.title),
        reference: apply(&current.reference, &m.reference),
        constraints: apply(&current.constraints, &m.constraints),
        search_range: apply(&current.search_range, &m.search_range),
        buffer: apply(&current.buffer, &m.buffer),
        selection: apply(&current.selection, &m.selection),
    };

    let invalidated = moved(&current.duration, &params.duration)
        || moved(&current.date, &params.date)
        || moved(&current.time, &params.time)
        || moved(&current.reference, &params.reference)
        || moved(&current.constraints, &params.constraints)
        || moved(&current.search_range, &params.search_range)
        || moved(&current.buffer, &params.buffer);

    Ok(Merged {
        params,
        invalidated,
    })
}
