//! Calendars shared by the unit tests.

/// Six timed events in Europe/London across May and June 2022, sorted.
pub const CAL_EXAMPLE: &str = include_str!("cal_example.ics");
/// The events of [`CAL_EXAMPLE`] in a scrambled order.
pub const CAL_SHUFFLED: &str = include_str!("cal_shuffled.ics");
/// Only the VTIMEZONE of [`CAL_EXAMPLE`].
pub const CAL_EMPTY: &str = include_str!("cal_empty.ics");
pub const CAL_EVENT_WITH_NO_START: &str = include_str!("cal_event_with_no_start.ics");
/// 09:00-10:00 and 09:30-11:00 UTC overlapping, then 12:00-13:00 alone.
pub const CAL_UNMERGED: &str = include_str!("cal_unmerged.ics");
/// A floating all-day event on 2024-09-23.
pub const ALL_DAY_EVENT: &str = include_str!("all_day_event.ics");
/// 2024-09-20 22:00 UTC until 2024-09-23 02:00 UTC.
pub const MULTI_DAY_EVENT: &str = include_str!("multi_day_event.ics");
