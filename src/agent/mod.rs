pub mod availability;
pub mod booking;
pub mod conflict;
mod error;
pub mod extractor;
pub mod intent;
pub mod merge;
pub mod models;
mod ports;
pub mod present;
mod registry;
mod session;
pub mod validate;

pub use error::SchedulerError;
pub use intent::{Directive, IntentKind, IntentResult, Modifications};
pub use models::{
    BookingRecord, CalendarSnapshot, Field, Param, Parameters, Phase, Session, Slot, SlotTag,
};
pub use ports::{
    CalendarEvent, CalendarReader, CalendarWriter, ClassifyRequest, IntentClassifier, NewEvent,
};
pub use registry::SessionRegistry;
pub use session::{Reply, Scheduler, TurnOutcome};
