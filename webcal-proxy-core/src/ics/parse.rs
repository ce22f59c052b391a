//! ICS parsing using the icalendar crate's parser.

use icalendar::parser::{self, read_calendar, unfold};

use crate::error::ParseError;
use icalendar::Property;

use crate::ics::{CalendarDocument, Component, RawComponent};

/// Parse calendar text into an owned document.
///
/// TEXT values come back unescaped. The top-level VCALENDAR's properties
/// become the document properties and its children the components.
pub fn parse_calendar(content: &str) -> Result<CalendarDocument, ParseError> {
    let unfolded = unfold(content);

    let head = unfolded.trim_start_matches('\u{feff}').trim_start();
    let begins_with_calendar = head
        .get(.."BEGIN:VCALENDAR".len())
        .is_some_and(|h| h.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !begins_with_calendar {
        return Err(ParseError::NotACalendar);
    }

    let calendar = read_calendar(head).map_err(|e| ParseError::Syntax(e.to_string()))?;

    Ok(CalendarDocument {
        properties: calendar.properties.iter().map(to_property).collect(),
        components: calendar
            .components
            .iter()
            .map(|c| Component::from_raw(to_component(c)))
            .collect(),
    })
}

fn to_component(component: &parser::Component) -> RawComponent {
    RawComponent {
        name: component.name.as_str().to_ascii_uppercase(),
        properties: component.properties.iter().map(to_property).collect(),
        components: component.components.iter().map(to_component).collect(),
    }
}

fn to_property(prop: &parser::Property) -> Property {
    // names keep their case: the parser only unescapes upper-case TEXT names
    // and the writer only escapes those same names
    let mut property = Property::new(prop.name.as_str(), prop.val.as_str());
    for param in &prop.params {
        let value = param
            .val
            .as_ref()
            .map_or("", |v| v.as_str().trim_matches('"'));
        property.add_parameter(&param.key.as_str().to_ascii_uppercase(), value);
    }
    property
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::ics::param;

    #[test]
    fn test_parse_keeps_calendar_properties_and_components() {
        let calendar = parse_calendar(fixtures::CAL_EXAMPLE).expect("Should parse");

        assert_eq!(
            calendar.property("PRODID").map(|p| p.value()),
            Some("-//Alpaca Racing//Schedule//EN")
        );
        assert_eq!(calendar.components[0].name(), "VTIMEZONE");
        assert_eq!(calendar.components[0].as_raw().components.len(), 2);
        assert_eq!(calendar.events().count(), 6);
    }

    #[test]
    fn test_parse_line_folding_preserves_whitespace() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:test-123\r\n\
SUMMARY:Test\r\n\
DTSTART:20240101T100000Z\r\n\
DESCRIPTION:Hello \r\n world and \r\n more text\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let calendar = parse_calendar(ics).expect("Should parse");
        let event = calendar.events().next().expect("Should have an event");
        assert_eq!(
            event.description(),
            Some("Hello world and more text"),
            "Line folding should preserve the space before 'world'"
        );
    }

    #[test]
    fn test_parse_keeps_parameters() {
        let calendar = parse_calendar(fixtures::CAL_EXAMPLE).unwrap();
        let event = calendar.events().next().unwrap();
        let start = event.property("DTSTART").unwrap();
        assert_eq!(param(start, "TZID"), Some("Europe/London"));
    }

    #[test]
    fn test_parse_rejects_non_calendar() {
        assert!(matches!(
            parse_calendar("I'm not ics\n"),
            Err(ParseError::NotACalendar)
        ));
        assert!(matches!(parse_calendar(""), Err(ParseError::NotACalendar)));
    }

    #[test]
    fn test_parse_unescapes_text_values() {
        let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
LOCATION:Room 4\\, Level 2\r\n\
DESCRIPTION:Bring hay\\; water\\nand a rope\r\n\
X-VENDOR-NOTE:kept\\, as sent\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let calendar = parse_calendar(ics).unwrap();
        let event = calendar.events().next().unwrap();
        assert_eq!(event.location(), Some("Room 4, Level 2"));
        assert_eq!(event.description(), Some("Bring hay; water\nand a rope"));
        assert_eq!(event.text("X-VENDOR-NOTE"), Some("kept, as sent"));
    }
}
