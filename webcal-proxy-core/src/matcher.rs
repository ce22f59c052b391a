//! `FIELD=PATTERN` rules used to include or exclude events.

use regex::Regex;

use crate::error::MatchError;
use crate::ics::EventComponent;

/// A single rule: a property name and the pattern its text must contain.
#[derive(Debug, Clone)]
pub struct MatchRule {
    property: String,
    expression: Regex,
}

impl MatchRule {
    pub fn new(property: &str, expression: Regex) -> Self {
        MatchRule {
            property: property.to_ascii_uppercase(),
            expression,
        }
    }

    /// Never matches when the event lacks the property.
    pub fn matches(&self, event: &EventComponent) -> bool {
        event
            .properties_named(&self.property)
            .any(|prop| self.expression.is_match(prop.value()))
    }
}

/// Rules combined with OR. An empty group matches nothing.
#[derive(Debug, Clone, Default)]
pub struct MatchGroup(Vec<MatchRule>);

impl MatchGroup {
    /// Compile rules of the shape `FIELD=PATTERN`.
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self, MatchError> {
        let mut group = Vec::with_capacity(rules.len());

        for (index, rule) in rules.iter().enumerate() {
            let rule = rule.as_ref();
            let mut parts = rule.split('=');
            let (Some(field), Some(pattern), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(MatchError::Malformed {
                    index,
                    rule: rule.to_string(),
                });
            };
            if field.is_empty() {
                return Err(MatchError::Malformed {
                    index,
                    rule: rule.to_string(),
                });
            }

            let expression = Regex::new(pattern).map_err(|source| MatchError::InvalidPattern {
                index,
                rule: rule.to_string(),
                source,
            })?;
            group.push(MatchRule::new(field, expression));
        }

        Ok(MatchGroup(group))
    }

    /// Includes used when the caller gives none: any event with a summary.
    pub fn default_include() -> Self {
        MatchGroup::parse(&["SUMMARY=.*"]).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn matches(&self, event: &EventComponent) -> bool {
        self.0.iter().any(|rule| rule.matches(event))
    }
}
