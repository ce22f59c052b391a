//! Owned iCalendar document model.
//!
//! Properties are `icalendar::Property` values, so TEXT values are held
//! unescaped and escaped again when written. Components keep their upstream
//! order and only the events are ever modified.

use chrono::Duration;
use icalendar::Property;

use crate::event::EventTime;

/// A parameter value such as the `Europe/London` of `TZID=Europe/London`.
///
/// Parameter names are upper-cased when a document is parsed.
pub fn param<'a>(property: &'a Property, key: &str) -> Option<&'a str> {
    property.params().get(key).map(|p| p.value())
}

/// Any component kept verbatim: VTIMEZONE, VTODO, VALARM, vendor blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<Property>,
    pub components: Vec<RawComponent>,
}

impl RawComponent {
    pub fn new(name: &str) -> Self {
        RawComponent {
            name: name.to_ascii_uppercase(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn find_prop(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.key().eq_ignore_ascii_case(name))
    }
}

/// A VEVENT with typed accessors over its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventComponent(RawComponent);

impl EventComponent {
    pub const NAME: &'static str = "VEVENT";

    pub fn new() -> Self {
        EventComponent(RawComponent::new(Self::NAME))
    }

    pub fn from_raw(raw: RawComponent) -> Self {
        EventComponent(raw)
    }

    pub fn raw(&self) -> &RawComponent {
        &self.0
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.0.find_prop(name)
    }

    /// Every occurrence of a property, for multi-valued ones like ATTENDEE.
    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Property> {
        self.0
            .properties
            .iter()
            .filter(move |p| p.key().eq_ignore_ascii_case(name))
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.property(name).map(Property::value)
    }

    pub fn summary(&self) -> Option<&str> {
        self.text("SUMMARY")
    }

    pub fn description(&self) -> Option<&str> {
        self.text("DESCRIPTION")
    }

    pub fn location(&self) -> Option<&str> {
        self.text("LOCATION")
    }

    pub fn uid(&self) -> Option<&str> {
        self.text("UID")
    }

    pub fn start(&self) -> Option<EventTime> {
        self.property("DTSTART").and_then(EventTime::from_property)
    }

    /// DTEND, or DTSTART + DURATION when only a duration is given.
    ///
    /// A duration that runs past the representable dates gives no end.
    pub fn end(&self) -> Option<EventTime> {
        if let Some(end) = self.property("DTEND").and_then(EventTime::from_property) {
            return Some(end);
        }
        let duration = self.duration()?;
        self.start()?.add(duration)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.property("DURATION")
            .and_then(|p| parse_duration(p.value()))
    }

    /// Replace the first property of the same name, or append it.
    pub fn set_property(&mut self, property: Property) {
        let existing = self
            .0
            .properties
            .iter_mut()
            .find(|p| p.key().eq_ignore_ascii_case(property.key()));
        match existing {
            Some(slot) => *slot = property,
            None => self.0.properties.push(property),
        }
    }

    pub fn set_text(&mut self, name: &str, text: &str) {
        match self
            .0
            .properties
            .iter_mut()
            .find(|p| p.key().eq_ignore_ascii_case(name))
        {
            // keep any LANGUAGE/ALTREP parameters
            Some(slot) => {
                let mut replacement = Property::new(slot.key(), text);
                for parameter in slot.params().values() {
                    replacement.append_parameter(parameter.clone());
                }
                *slot = replacement;
            }
            None => self
                .0
                .properties
                .push(Property::new(name.to_ascii_uppercase(), text)),
        }
    }

    pub fn set_summary(&mut self, summary: &str) {
        self.set_text("SUMMARY", summary);
    }

    pub fn set_description(&mut self, description: &str) {
        self.set_text("DESCRIPTION", description);
    }

    pub fn remove_property(&mut self, name: &str) {
        self.0
            .properties
            .retain(|p| !p.key().eq_ignore_ascii_case(name));
    }

    pub fn push_property(&mut self, property: Property) {
        self.0.properties.push(property);
    }
}

impl Default for EventComponent {
    fn default() -> Self {
        Self::new()
    }
}

/// A top-level calendar component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Event(EventComponent),
    Other(RawComponent),
}

impl Component {
    pub fn from_raw(raw: RawComponent) -> Self {
        if raw.name.eq_ignore_ascii_case(EventComponent::NAME) {
            Component::Event(EventComponent::from_raw(raw))
        } else {
            Component::Other(raw)
        }
    }

    pub fn name(&self) -> &str {
        &self.as_raw().name
    }

    pub fn as_event(&self) -> Option<&EventComponent> {
        match self {
            Component::Event(event) => Some(event),
            Component::Other(_) => None,
        }
    }

    pub fn as_raw(&self) -> &RawComponent {
        match self {
            Component::Event(event) => event.raw(),
            Component::Other(raw) => raw,
        }
    }
}

/// A VCALENDAR: its own properties plus its child components, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarDocument {
    pub properties: Vec<Property>,
    pub components: Vec<Component>,
}

impl CalendarDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> impl Iterator<Item = &EventComponent> {
        self.components.iter().filter_map(Component::as_event)
    }

    pub fn push_event(&mut self, event: EventComponent) {
        self.components.push(Component::Event(event));
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.key().eq_ignore_ascii_case(name))
    }
}

/// Parse an RFC 5545 DURATION value such as `PT1H30M`, `P1D` or `-PT15M`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let duration = iso8601::duration(rest).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if negative { -duration } else { duration })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    #[test]
    fn test_set_text_keeps_parameters() {
        let mut event = EventComponent::new();
        event.push_property(
            Property::new("SUMMARY", "Old")
                .add_parameter("LANGUAGE", "en")
                .done(),
        );
        event.set_summary("New, improved");

        let summary = event.property("summary").unwrap();
        assert_eq!(summary.value(), "New, improved");
        assert_eq!(param(summary, "LANGUAGE"), Some("en"));
        assert_eq!(event.summary(), Some("New, improved"));
    }

    #[test]
    fn test_end_from_duration() {
        let mut event = EventComponent::new();
        event.push_property(Property::new("DTSTART", "20240923T090000Z"));
        event.push_property(Property::new("DURATION", "PT1H30M"));

        let start = event.start().unwrap().in_zone(Tz::UTC);
        let end = event.end().unwrap().in_zone(Tz::UTC);
        assert_eq!(end - start, Duration::minutes(90));
    }

    #[test]
    fn test_out_of_range_duration_gives_no_end() {
        let mut event = EventComponent::new();
        event.push_property(Property::new("DTSTART", "20240923T090000Z"));
        event.push_property(Property::new("DURATION", "P100000000D"));

        assert!(event.duration().is_some());
        assert_eq!(event.end(), None);
    }

    #[test]
    fn test_parse_negative_duration() {
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("nonsense"), None);
    }

    #[test]
    fn test_component_as_event() {
        let event = Component::from_raw(RawComponent::new("vevent"));
        assert!(event.as_event().is_some());

        let tz = Component::from_raw(RawComponent::new("VTIMEZONE"));
        assert!(tz.as_event().is_none());
        assert_eq!(tz.name(), "VTIMEZONE");
    }
}
