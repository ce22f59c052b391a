//! iCalendar document model, parsing and serialization.
//!
//! Lexing, TEXT escaping and line folding are done by the icalendar crate;
//! this module owns the document structure so events can be filtered and
//! merged while everything else is written back in its upstream order.

mod document;
mod generate;
mod parse;

pub use document::{
    CalendarDocument, Component, EventComponent, RawComponent, param, parse_duration,
};
pub use icalendar::Property;
pub use generate::serialize_calendar;
pub use parse::parse_calendar;

/// Media type of iCalendar documents.
pub const CALENDAR_MEDIA_TYPE: &str = "text/calendar";
