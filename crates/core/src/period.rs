use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format every persisted and queried date uses.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    // chrono accepts unpadded fields; the stored form must stay string-sortable.
    if raw.len() != 10 {
        return Err(format!("Invalid date '{raw}': expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| format!("Invalid date '{raw}': {e}"))
}

/// Optional inclusive bounds used to filter transactions by date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "{s} to {e}"),
            (Some(s), None) => write!(f, "from {s}"),
            (None, Some(e)) => write!(f, "until {e}"),
            (None, None) => write!(f, "all dates"),
        }
    }
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn all() -> Self {
        DateRange::default()
    }

    /// Builds a range from optional `YYYY-MM-DD` strings.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let start = start.filter(|s| !s.trim().is_empty()).map(parse_date).transpose()?;
        let end = end.filter(|s| !s.trim().is_empty()).map(parse_date).transpose()?;
        Ok(DateRange { start, end })
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}
