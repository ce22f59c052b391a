//! Event start/end times and their normalisation into a reference zone.

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{CalendarDateTime, DatePerhapsTime};
use serde::{Deserialize, Serialize};

use crate::ics::Property;

/// A DTSTART/DTEND value, preserving how the upstream expressed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    /// All-day value (`VALUE=DATE`), floating by definition.
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    /// Wall-clock time with no zone attached.
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl EventTime {
    /// Read a date-time property.
    ///
    /// Handles:
    /// - TZID parameter: `DTSTART;TZID=America/New_York:20240108T100000`
    /// - VALUE=DATE: `DTSTART;VALUE=DATE:20240108`
    /// - UTC: `DTSTART:20240108T100000Z`
    /// - Floating: `DTSTART:20240108T100000`
    pub fn from_property(prop: &Property) -> Option<EventTime> {
        DatePerhapsTime::from_property(prop).map(to_event_time)
    }

    /// Render back into a property, the inverse of [`EventTime::from_property`].
    pub fn to_property(&self, name: &str) -> Property {
        let time = match self {
            EventTime::Date(d) => DatePerhapsTime::Date(*d),
            EventTime::DateTimeUtc(dt) => DatePerhapsTime::DateTime(CalendarDateTime::Utc(*dt)),
            EventTime::DateTimeFloating(dt) => {
                DatePerhapsTime::DateTime(CalendarDateTime::Floating(*dt))
            }
            EventTime::DateTimeZoned { datetime, tzid } => {
                DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone {
                    date_time: *datetime,
                    tzid: tzid.clone(),
                })
            }
        };
        time.to_property(name)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Shift by `duration`, or `None` when the result leaves chrono's range.
    pub fn add(&self, duration: Duration) -> Option<EventTime> {
        Some(match self {
            EventTime::Date(d) if duration.num_seconds() % 86_400 == 0 => {
                EventTime::Date(d.checked_add_signed(Duration::days(duration.num_days()))?)
            }
            EventTime::Date(d) => EventTime::DateTimeFloating(
                d.and_time(NaiveTime::MIN).checked_add_signed(duration)?,
            ),
            EventTime::DateTimeUtc(dt) => EventTime::DateTimeUtc(dt.checked_add_signed(duration)?),
            EventTime::DateTimeFloating(dt) => {
                EventTime::DateTimeFloating(dt.checked_add_signed(duration)?)
            }
            EventTime::DateTimeZoned { datetime, tzid } => EventTime::DateTimeZoned {
                datetime: datetime.checked_add_signed(duration)?,
                tzid: tzid.clone(),
            },
        })
    }

    /// Express this time in `reference`.
    ///
    /// Floating values keep their wall-clock fields and only take the zone;
    /// UTC and zoned values are converted as instants. A TZID chrono-tz does
    /// not know is treated as floating.
    pub fn in_zone(&self, reference: Tz) -> DateTime<Tz> {
        match self {
            EventTime::Date(d) => local_datetime(reference, d.and_time(NaiveTime::MIN)),
            EventTime::DateTimeFloating(dt) => local_datetime(reference, *dt),
            EventTime::DateTimeUtc(dt) => dt.with_timezone(&reference),
            EventTime::DateTimeZoned { datetime, tzid } => match parse_tzid(tzid) {
                Some(zone) => local_datetime(zone, *datetime).with_timezone(&reference),
                None => {
                    tracing::debug!(tzid = %tzid, "Unknown TZID, treating time as floating");
                    local_datetime(reference, *datetime)
                }
            },
        }
    }
}

fn parse_tzid(tzid: &str) -> Option<Tz> {
    tzid.trim_matches('"').parse::<Tz>().ok()
}

/// Resolve a wall-clock time in `tz`.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times in a DST
/// gap move forward to the first valid instant after the gap.
pub fn local_datetime(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let mut shifted = naive;
            for _ in 0..4 {
                let Some(next) = shifted.checked_add_signed(Duration::minutes(30)) else {
                    break;
                };
                shifted = next;
                if let Some(dt) = tz.from_local_datetime(&shifted).earliest() {
                    return dt;
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            CalendarDateTime::WithTimezone { date_time, tzid } => EventTime::DateTimeZoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}
