use chrono::{DateTime, Utc};
use human_errors::ResultExt;

/// The timestamp format used by the Graph API, e.g. `2017-10-01T12:00:00+0000`.
pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(value, FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn format(value: &DateTime<Utc>) -> String {
    value.format(FORMAT).to_string()
}

pub fn serialize<S: serde::Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let value: String = serde::Deserialize::deserialize(deserializer)?;
    parse(&value).map_err(serde::de::Error::custom)
}

pub mod option {
    use chrono::{DateTime, Utc};

    pub fn serialize<S: serde::Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&super::format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let value: Option<String> = serde::Deserialize::deserialize(deserializer)?;
        value
            .map(|v| super::parse(&v).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// The inclusive `since`/`until` range of posts requested from the Graph API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Window {
    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Self {
        Self { since, until }
    }

    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self, human_errors::Error> {
        let parse_bound = |name: &str, value: Option<&str>| {
            value
                .map(|v| {
                    parse(v).wrap_err_as_user(
                        format!("The '{name}' date '{v}' could not be understood."),
                        &[
                            "Provide dates in the format YYYY-MM-DDTHH:MM:SS+0000, e.g. 2017-10-01T00:00:00+0000.",
                        ],
                    )
                })
                .transpose()
        };

        let window = Self {
            since: parse_bound("since", since)?,
            until: parse_bound("until", until)?,
        };

        if window.is_empty() {
            return Err(human_errors::user(
                "The 'since' date must be earlier than the 'until' date.",
                &["Swap the two dates, or leave one of them out to scrape without that bound."],
            ));
        }

        Ok(window)
    }

    /// Lowers `until` to `bound` if it is earlier than the current upper bound.
    pub fn clamp_until(self, bound: Option<DateTime<Utc>>) -> Self {
        let until = match (self.until, bound) {
            (Some(until), Some(bound)) => Some(until.min(bound)),
            (until, bound) => until.or(bound),
        };

        Self { until, ..self }
    }

    /// Raises `since` to `bound` if it is later than the current lower bound.
    pub fn clamp_since(self, bound: Option<DateTime<Utc>>) -> Self {
        let since = match (self.since, bound) {
            (Some(since), Some(bound)) => Some(since.max(bound)),
            (since, bound) => since.or(bound),
        };

        Self { since, ..self }
    }

    pub fn is_empty(&self) -> bool {
        matches!((self.since, self.until), (Some(since), Some(until)) if since >= until)
    }
}
