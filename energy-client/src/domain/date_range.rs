use std::fmt;

use time::{macros::format_description, Date};

#[derive(thiserror::Error, Debug)]
#[error("invalid date '{input}', expected YYYY-MM-DD: {source}")]
pub struct DateParseError {
    input: String,
    #[source]
    source: time::error::Parse,
}

/// Inclusive calendar date range as supplied on the command line.
///
/// Only the format is checked; a start after the end is passed through to
/// the upstream APIs unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

fn parse_date(input: &str) -> Result<Date, DateParseError> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]")).map_err(|source| {
        DateParseError {
            input: input.to_string(),
            source,
        }
    })
}

fn iso(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, DateParseError> {
        Ok(Self {
            start: parse_date(start)?,
            end: parse_date(end)?,
        })
    }

    /// `YYYY-MM-DD`
    pub fn start_iso(&self) -> String {
        iso(self.start)
    }

    /// `YYYY-MM-DD`
    pub fn end_iso(&self) -> String {
        iso(self.end)
    }

    /// First instant of the range, `YYYY-MM-DDT00:00:00Z`.
    pub fn start_instant(&self) -> String {
        format!("{}T00:00:00Z", self.start_iso())
    }

    /// Last second of the range, `YYYY-MM-DDT23:59:59Z`.
    pub fn end_instant(&self) -> String {
        format!("{}T23:59:59Z", self.end_iso())
    }

    /// `YYYYMMDD` form of the start date.
    pub fn compact_start(&self) -> String {
        self.start_iso().replace('-', "")
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_iso(), self.end_iso())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_iso_dates() {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        assert_eq!(range.start, date!(2024 - 01 - 01));
        assert_eq!(range.end, date!(2024 - 01 - 31));
        assert_eq!(range.to_string(), "2024-01-01..=2024-01-31");
    }

    #[test]
    fn rejects_other_formats() {
        assert!(DateRange::parse("01/01/2024", "2024-01-31").is_err());
        assert!(DateRange::parse("2024-01-01", "2024-13-01").is_err());
    }

    #[test]
    fn accepts_reversed_range() {
        let range = DateRange::parse("2024-02-01", "2024-01-01").unwrap();
        assert!(range.start > range.end);
    }

    #[test]
    fn renders_query_bounds() {
        let range = DateRange::new(date!(2024 - 03 - 05), date!(2024 - 03 - 06));
        assert_eq!(range.start_instant(), "2024-03-05T00:00:00Z");
        assert_eq!(range.end_instant(), "2024-03-06T23:59:59Z");
        assert_eq!(range.compact_start(), "20240305");
    }
}
