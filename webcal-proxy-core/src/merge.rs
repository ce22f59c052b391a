//! Merging of overlapping events.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::event::EventTime;
use crate::ics::EventComponent;

/// Merge events whose times overlap, in a single pass.
///
/// `events` must already be sorted by start time; the output is not
/// re-sorted. An event starting before the furthest end seen so far is
/// folded into the previous output event: summaries are joined with
/// `" + "`, descriptions are appended under the merged event's summary and
/// the end time is extended when the merged event ends later.
pub fn merge_events(events: Vec<EventComponent>, reference: Tz) -> Vec<EventComponent> {
    let mut merged: Vec<EventComponent> = Vec::with_capacity(events.len());
    let mut last_end: Option<DateTime<Tz>> = None;

    for event in events {
        let Some(start) = event.start().map(|s| s.in_zone(reference)) else {
            merged.push(event);
            continue;
        };
        let end_time = event.end();
        let end = end_time
            .as_ref()
            .map(|e| e.in_zone(reference))
            .filter(|e| *e >= start)
            .unwrap_or(start);

        let overlapping = match (merged.last(), last_end) {
            (Some(_), Some(last)) => start < last,
            _ => false,
        };
        if !overlapping {
            last_end = Some(last_end.map_or(end, |last| last.max(end)));
            merged.push(event);
            continue;
        }

        let Some(last_event) = merged.last_mut() else {
            continue;
        };
        fold_into(last_event, &event);

        if last_end.is_some_and(|last| end > last) {
            extend_end(last_event, &event, end_time);
            last_end = Some(end);
        }
    }

    merged
}

fn fold_into(last_event: &mut EventComponent, event: &EventComponent) {
    let summary = event.summary();

    let mut new_summary = last_event.summary().unwrap_or_default().to_string();
    if let Some(summary) = summary {
        new_summary.push_str(" + ");
        new_summary.push_str(summary);
    }
    last_event.set_summary(&new_summary);

    let mut new_description = last_event.description().unwrap_or_default().to_string();
    if let Some(description) = event.description() {
        new_description.push_str("\n\n---\n");
        if let Some(summary) = summary {
            new_description.push_str(summary);
            new_description.push('\n');
        }
        new_description.push('\n');
        new_description.push_str(description);
    }
    if !new_description.is_empty() {
        last_event.set_description(&new_description);
    }
}

/// Give `last_event` the end of `event`, keeping the DTEND parameters.
fn extend_end(last_event: &mut EventComponent, event: &EventComponent, end: Option<EventTime>) {
    let dtend = match event.property("DTEND") {
        Some(prop) => prop.clone(),
        None => match end {
            Some(end) => end.to_property("DTEND"),
            None => return,
        },
    };
    last_event.remove_property("DURATION");
    last_event.set_property(dtend);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::{Property, param};
    use chrono::Duration;

    /// Total time covered by the union of the events' intervals.
    fn coverage(events: &[EventComponent], reference: Tz) -> Duration {
        let mut intervals: Vec<(DateTime<Tz>, DateTime<Tz>)> = events
            .iter()
            .filter_map(|event| {
                let start = event.start()?.in_zone(reference);
                let end = event
                    .end()
                    .map(|e| e.in_zone(reference))
                    .filter(|e| *e >= start)
                    .unwrap_or(start);
                Some((start, end))
            })
            .collect();
        intervals.sort();

        let mut total = Duration::zero();
        let mut current: Option<(DateTime<Tz>, DateTime<Tz>)> = None;
        for (start, end) in intervals {
            current = match current {
                Some((cur_start, cur_end)) if start <= cur_end => {
                    Some((cur_start, cur_end.max(end)))
                }
                Some((cur_start, cur_end)) => {
                    total += cur_end - cur_start;
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }
        if let Some((start, end)) = current {
            total += end - start;
        }
        total
    }

    fn event(summary: &str, start: &str, end: Option<&str>, description: Option<&str>) -> EventComponent {
        let mut event = EventComponent::new();
        event.set_summary(summary);
        event.push_property(Property::new("DTSTART", start));
        if let Some(end) = end {
            event.push_property(Property::new("DTEND", end));
        }
        if let Some(description) = description {
            event.set_description(description);
        }
        event
    }

    #[test]
    fn test_overlapping_pair_merges() {
        let events = vec![
            event("A", "20240923T090000Z", Some("20240923T100000Z"), None),
            event("B", "20240923T093000Z", Some("20240923T110000Z"), None),
        ];

        let merged = merge_events(events, Tz::UTC);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].summary(), Some("A + B"));
        assert_eq!(merged[0].property("DTSTART").unwrap().value(), "20240923T090000Z");
        assert_eq!(merged[0].property("DTEND").unwrap().value(), "20240923T110000Z");
    }

    #[test]
    fn test_adjacent_events_stay_separate() {
        let events = vec![
            event("A", "20240923T090000Z", Some("20240923T100000Z"), None),
            event("B", "20240923T100000Z", Some("20240923T110000Z"), None),
        ];

        let merged = merge_events(events, Tz::UTC);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].summary(), Some("B"));
    }

    #[test]
    fn test_contained_event_does_not_shrink_end() {
        let events = vec![
            event("Long", "20240923T090000Z", Some("20240923T120000Z"), None),
            event("Short", "20240923T100000Z", Some("20240923T103000Z"), None),
            event("Late", "20240923T113000Z", Some("20240923T130000Z"), None),
        ];

        let merged = merge_events(events, Tz::UTC);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].summary(), Some("Long + Short + Late"));
        assert_eq!(merged[0].property("DTEND").unwrap().value(), "20240923T130000Z");
    }

    #[test]
    fn test_descriptions_are_appended_under_summary() {
        let events = vec![
            event("A", "20240923T090000Z", Some("20240923T100000Z"), Some("first")),
            event("B", "20240923T093000Z", Some("20240923T094500Z"), Some("second")),
        ];

        let merged = merge_events(events, Tz::UTC);

        assert_eq!(
            merged[0].description(),
            Some("first\n\n---\nB\n\nsecond")
        );
    }

    #[test]
    fn test_end_parameters_are_copied() {
        let mut late = event("B", "20240923T100000Z", None, None);
        late.push_property(
            Property::new("DTEND", "20240923T130000")
                .add_parameter("TZID", "Europe/London")
                .done(),
        );
        let events = vec![
            event("A", "20240923T090000Z", Some("20240923T110000Z"), None),
            late,
        ];

        let merged = merge_events(events, Tz::UTC);

        let dtend = merged[0].property("DTEND").unwrap();
        assert_eq!(dtend.value(), "20240923T130000");
        assert_eq!(param(dtend, "TZID"), Some("Europe/London"));
    }

    #[test]
    fn test_duration_end_replaces_duration() {
        let mut first = event("A", "20240923T090000Z", None, None);
        first.push_property(Property::new("DURATION", "PT1H"));
        let mut second = event("B", "20240923T093000Z", None, None);
        second.push_property(Property::new("DURATION", "PT2H"));

        let merged = merge_events(vec![first, second], Tz::UTC);

        assert_eq!(merged.len(), 1);
        assert!(merged[0].property("DURATION").is_none());
        assert_eq!(merged[0].property("DTEND").unwrap().value(), "20240923T113000Z");
    }

    #[test]
    fn test_end_before_start_is_clamped() {
        let events = vec![
            event("Backwards", "20240923T090000Z", Some("20240923T080000Z"), None),
            event("Next", "20240923T090000Z", Some("20240923T093000Z"), None),
        ];

        let merged = merge_events(events, Tz::UTC);

        // zero length, so the next event starting at the same instant doesn't overlap it
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_never_grows_or_loses_coverage() {
        let events = vec![
            event("A", "20240923T090000Z", Some("20240923T100000Z"), None),
            event("B", "20240923T093000Z", Some("20240923T110000Z"), None),
            event("C", "20240923T120000Z", Some("20240923T123000Z"), None),
            event("D", "20240923T121500Z", Some("20240923T121600Z"), None),
            event("E", "20240924T000000Z", None, None),
        ];
        let before_count = events.len();
        let before = coverage(&events, Tz::UTC);

        let merged = merge_events(events, Tz::UTC);

        assert!(merged.len() <= before_count);
        assert_eq!(merged.len(), 3);
        assert!(coverage(&merged, Tz::UTC) >= before);
    }

    #[test]
    fn test_out_of_range_duration_counts_as_zero_length() {
        let mut runaway = event("Runaway", "20240923T090000Z", None, None);
        runaway.push_property(Property::new("DURATION", "P100000000D"));
        let events = vec![
            runaway,
            event("Next", "20240923T090000Z", Some("20240923T093000Z"), None),
        ];

        let merged = merge_events(events, Tz::UTC);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].property("DURATION").unwrap().value(), "P100000000D");
    }
}
