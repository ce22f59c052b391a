//! Month grid for the calendar view.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use crate::event::local_datetime;
use crate::ics::{CalendarDocument, EventComponent};

/// A month laid out in whole Monday-to-Sunday weeks.
#[derive(Debug, Clone, Serialize)]
pub struct Month {
    pub title: String,
    pub days: Vec<Day>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Day {
    pub date: NaiveDate,
    pub number: u32,
    /// Lowercase English weekday name, e.g. `monday`.
    pub weekday: String,
    pub today: bool,
    /// The day belongs to the previous or next month.
    pub spill: bool,
    /// `None` when the grid was built without a calendar.
    pub events: Option<Vec<DayEvent>>,
}

impl Day {
    /// Compare calendar dates only; the zone a day was built in is ignored.
    pub fn same_date(&self, other: &Day) -> bool {
        self.date == other.date
    }
}

/// The parts of an event shown in the grid.
#[derive(Debug, Clone, Serialize)]
pub struct DayEvent {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl DayEvent {
    fn from_event(event: &EventComponent, zone: Tz) -> Option<DayEvent> {
        let Some(start_time) = event.start() else {
            tracing::warn!(uid = ?event.uid(), "Event has no start time, skipping");
            return None;
        };

        let start = start_time.in_zone(zone);
        let end = match event.end() {
            Some(end) => end.in_zone(zone),
            // all-day events with no end last the day
            None if start_time.is_date() => start_time
                .add(Duration::days(1))
                .map_or(start, |end| end.in_zone(zone)),
            None => start,
        };

        Some(DayEvent {
            start,
            end: end.max(start),
            summary: event.summary().map(str::to_string),
            location: event.location().map(str::to_string),
            description: event.description().map(str::to_string),
        })
    }

    /// Whether the event's `[start, end)` meets `[from, until)`. Zero length
    /// events occur on the day holding their start.
    fn occurs_between(&self, from: DateTime<Tz>, until: DateTime<Tz>) -> bool {
        if self.start == self.end {
            return from <= self.start && self.start < until;
        }
        self.start < until && self.end > from
    }
}

/// Build the grid for the month containing `target`, in `target`'s zone.
///
/// `now` marks today. Every day of the month appears once, padded with
/// spill days so the grid starts on a Monday and ends on a Sunday.
pub fn build_month(
    target: DateTime<Tz>,
    now: DateTime<Tz>,
    calendar: Option<&CalendarDocument>,
) -> Month {
    let zone = target.timezone();
    let today = now.with_timezone(&zone).date_naive();

    let first = target.date_naive() - Duration::days(i64::from(target.day0()));
    let grid_start = first - Duration::days(i64::from(first.weekday().num_days_from_monday()));
    let next_month = first
        .checked_add_months(Months::new(1))
        .unwrap_or(NaiveDate::MAX);
    let mut grid_end = next_month;
    while grid_end.weekday() != Weekday::Mon && grid_end < NaiveDate::MAX {
        grid_end += Duration::days(1);
    }

    let events: Option<Vec<DayEvent>> = calendar.map(|calendar| {
        calendar
            .events()
            .filter_map(|event| DayEvent::from_event(event, zone))
            .collect()
    });

    let days = grid_start
        .iter_days()
        .take_while(|date| *date < grid_end)
        .map(|date| {
            let from = day_start(zone, date);
            let until = day_start(zone, date + Duration::days(1));
            Day {
                date,
                number: date.day(),
                weekday: weekday_name(date.weekday()).to_string(),
                today: date == today,
                spill: date < first || date >= next_month,
                events: events.as_ref().map(|events| {
                    events
                        .iter()
                        .filter(|event| event.occurs_between(from, until))
                        .cloned()
                        .collect()
                }),
            }
        })
        .collect();

    Month {
        title: target.format("%B %Y").to_string(),
        days,
    }
}

fn day_start(zone: Tz, date: NaiveDate) -> DateTime<Tz> {
    local_datetime(zone, date.and_time(NaiveTime::MIN))
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
