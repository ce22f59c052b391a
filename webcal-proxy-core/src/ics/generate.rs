//! ICS serialization.
//!
//! Content lines are written by `icalendar::Property`, which escapes TEXT
//! values and folds long lines. The component structure is written here so
//! the upstream order survives and no DTSTAMP or UID is invented.

use std::fmt;

use icalendar::Property;

use crate::ics::{CalendarDocument, RawComponent};

/// Serialize a document to RFC 5545 text with CRLF line endings.
pub fn serialize_calendar(calendar: &CalendarDocument) -> String {
    calendar.to_string()
}

impl fmt::Display for CalendarDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BEGIN:VCALENDAR\r\n")?;
        for property in &self.properties {
            write_property(f, property)?;
        }
        for component in &self.components {
            write_component(f, component.as_raw())?;
        }
        write!(f, "END:VCALENDAR\r\n")
    }
}

fn write_component(f: &mut fmt::Formatter<'_>, component: &RawComponent) -> fmt::Result {
    write!(f, "BEGIN:{}\r\n", component.name)?;
    for property in &component.properties {
        write_property(f, property)?;
    }
    for child in &component.components {
        write_component(f, child)?;
    }
    write!(f, "END:{}\r\n", component.name)
}

fn write_property(f: &mut fmt::Formatter<'_>, property: &Property) -> fmt::Result {
    let line: String = property.clone().try_into()?;
    f.write_str(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::ics::{EventComponent, parse_calendar};

    #[test]
    fn test_serialize_then_parse_is_stable() {
        let calendar = parse_calendar(fixtures::CAL_EXAMPLE).unwrap();
        let text = serialize_calendar(&calendar);
        let reparsed = parse_calendar(&text).unwrap();

        assert_eq!(reparsed, calendar);
        assert_eq!(serialize_calendar(&reparsed), text);
    }

    #[test]
    fn test_long_lines_are_folded() {
        let mut calendar = CalendarDocument::new();
        let mut event = EventComponent::new();
        let long = "é".repeat(100);
        event.set_description(&long);
        calendar.push_event(event);

        let text = serialize_calendar(&calendar);
        for line in text.split("\r\n") {
            assert!(line.len() <= 75, "line too long: {}", line.len());
        }

        let reparsed = parse_calendar(&text).unwrap();
        let event = reparsed.events().next().unwrap();
        assert_eq!(event.description(), Some(long.as_str()));
    }

    #[test]
    fn test_parameters_with_separators_are_quoted() {
        let mut calendar = CalendarDocument::new();
        let mut event = EventComponent::new();
        event.push_property(
            Property::new("ORGANIZER", "mailto:alice@example.com")
                .add_parameter("CN", "Smith, Alice")
                .done(),
        );
        calendar.push_event(event);

        let text = serialize_calendar(&calendar);
        assert!(text.contains("ORGANIZER;CN=\"Smith, Alice\":mailto:alice@example.com\r\n"));
    }

    #[test]
    fn test_text_values_are_escaped_again() {
        let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
LOCATION:Paddock 4\\, North Field\r\n\
DTSTART;TZID=Europe/London:20240923T090000\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let calendar = parse_calendar(ics).unwrap();
        assert_eq!(
            calendar.events().next().unwrap().location(),
            Some("Paddock 4, North Field")
        );

        let text = serialize_calendar(&calendar);
        assert!(text.contains("LOCATION:Paddock 4\\, North Field\r\n"));
        assert!(text.contains("DTSTART;TZID=Europe/London:20240923T090000\r\n"));
        assert!(!text.contains("DTSTAMP"));
    }

    #[test]
    fn test_summary_with_separators_is_escaped() {
        let mut calendar = CalendarDocument::new();
        let mut event = EventComponent::new();
        event.set_summary("Feed; water, brush\\groom");
        calendar.push_event(event);

        let text = serialize_calendar(&calendar);
        assert!(text.contains("SUMMARY:Feed\\; water\\, brush\\\\groom\r\n"));

        let reparsed = parse_calendar(&text).unwrap();
        assert_eq!(
            reparsed.events().next().unwrap().summary(),
            Some("Feed; water, brush\\groom")
        );
    }
}
