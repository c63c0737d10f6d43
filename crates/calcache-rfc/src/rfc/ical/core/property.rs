//! iCalendar properties, parameters and content lines (RFC 5545 §3.1, §3.2).

use super::{Date, DateTime, Duration, Value};

/// A single property parameter, e.g. `TZID=America/New_York`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name (normalized to uppercase).
    pub name: String,
    /// Most parameters have one value; MEMBER and friends can have several.
    pub values: Vec<String>,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::with_values(name, vec![value.into()])
    }

    #[must_use]
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            values,
        }
    }

    /// Returns the first (and usually only) value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// A raw content line before value type resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    pub name: String,
    pub params: Vec<Parameter>,
    /// Value text after unfolding, before unescaping.
    pub raw_value: String,
}

impl ContentLine {
    #[must_use]
    pub fn param_value(&self, name: &str) -> Option<&str> {
        find_param(&self.params, name)?.value()
    }
}

/// A parsed property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name (normalized to uppercase).
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: Value,
    /// Original value text, written back verbatim for non-text values.
    pub raw_value: String,
}

impl Property {
    /// Creates a property with a text value.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: value.clone(),
            value: Value::Text(value),
        }
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            value: Value::Integer(value),
            raw_value: value.to_string(),
        }
    }

    /// Creates a DATE-TIME property; a zoned value gets its `TZID` parameter.
    #[must_use]
    pub fn datetime(name: impl Into<String>, dt: DateTime) -> Self {
        let params = dt
            .tzid()
            .map(|tzid| vec![Parameter::new("TZID", tzid)])
            .unwrap_or_default();
        Self {
            name: name.into().to_ascii_uppercase(),
            params,
            raw_value: dt.to_string(),
            value: Value::DateTime(dt),
        }
    }

    #[must_use]
    pub fn date(name: impl Into<String>, date: Date) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: vec![Parameter::new("VALUE", "DATE")],
            raw_value: date.to_string(),
            value: Value::Date(date),
        }
    }

    #[must_use]
    pub fn duration(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params: Vec::new(),
            raw_value: duration.to_string(),
            value: Value::Duration(duration),
        }
    }

    /// Creates a CAL-ADDRESS property such as ATTENDEE, with an optional CN.
    #[must_use]
    pub fn cal_address(name: impl Into<String>, address: impl Into<String>, cn: Option<&str>) -> Self {
        let address = address.into();
        Self {
            name: name.into().to_ascii_uppercase(),
            params: cn.map(|cn| vec![Parameter::new("CN", cn)]).unwrap_or_default(),
            raw_value: address.clone(),
            value: Value::Uri(address),
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.set_param(param);
        self
    }

    /// Sets a parameter, replacing any existing one with the same name.
    pub fn set_param(&mut self, param: Parameter) {
        self.params.retain(|p| p.name != param.name);
        self.params.push(param);
    }

    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Parameter> {
        find_param(&self.params, name)
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        self.get_param(name)?.value()
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    #[must_use]
    pub fn as_integer(&self) -> Option<i32> {
        self.value.as_integer()
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        self.value.as_datetime()
    }

    #[must_use]
    pub fn as_date(&self) -> Option<&Date> {
        self.value.as_date()
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<&Duration> {
        self.value.as_duration()
    }

    /// Returns every TEXT value carried by this property.
    ///
    /// CATEGORIES holds a list; plain TEXT properties yield one entry.
    #[must_use]
    pub fn text_values(&self) -> Vec<&str> {
        match &self.value {
            Value::TextList(list) => list.iter().map(String::as_str).collect(),
            Value::Text(text) => vec![text.as_str()],
            _ => Vec::new(),
        }
    }
}

fn find_param<'a>(params: &'a [Parameter], name: &str) -> Option<&'a Parameter> {
    params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
