use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    db::influx::{InfluxClient, InfluxQuery, QueryError, Series},
    domain::{DateRange, FieldValue, MeasurementRow},
};

const RESERVED_PREFIX: &str = "select";

/// Measurement names starting with `select` (any case) are never queried.
pub fn is_reserved_measurement(name: &str) -> bool {
    name.get(..RESERVED_PREFIX.len())
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case(RESERVED_PREFIX))
}

/// Double-quoted InfluxQL identifier.
pub fn quote_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn regex_literal(pattern: &str) -> String {
    format!("/{}/", pattern.replace('/', "\\/"))
}

/// All samples of one measurement within the range whose `entity_id`
/// matches `entity_pattern`. Range bounds are bound parameters.
pub fn measurement_range_query(
    measurement: &str,
    entity_pattern: &str,
    range: &DateRange,
) -> InfluxQuery {
    let text = format!(
        "SELECT * FROM {} WHERE time >= $start AND time <= $end AND \"entity_id\" =~ {}",
        quote_identifier(measurement),
        regex_literal(entity_pattern),
    );
    InfluxQuery::new(text)
        .bind("start", range.start_instant())
        .bind("end", range.end_instant())
}

/// Flatten one series into rows tagged with `measurement`.
pub fn series_to_rows(measurement: &str, series: Series) -> Vec<MeasurementRow> {
    let time_idx = series.columns.iter().position(|c| c == "time");

    series
        .values
        .into_iter()
        .map(|values| {
            let mut time = None;
            let mut fields = Vec::with_capacity(series.columns.len());
            for (idx, (column, value)) in series.columns.iter().zip(values).enumerate() {
                if Some(idx) == time_idx {
                    time = value
                        .as_str()
                        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());
                } else {
                    fields.push((column.clone(), FieldValue::from(value)));
                }
            }
            MeasurementRow {
                time,
                measurement: measurement.to_string(),
                fields,
            }
        })
        .collect()
}

/// Fetch the samples of one measurement; an empty vec means no data.
pub async fn measurement_rows(
    client: &InfluxClient,
    measurement: &str,
    entity_pattern: &str,
    range: &DateRange,
) -> Result<Vec<MeasurementRow>, QueryError> {
    let query = measurement_range_query(measurement, entity_pattern, range);
    let series = client.query(&query).await?;

    Ok(series
        .into_iter()
        .filter(|s| s.name == measurement)
        .flat_map(|s| series_to_rows(measurement, s))
        .collect())
}

/// Measurements whose name contains `pattern`, ignoring case.
pub async fn matching_measurements(
    client: &InfluxClient,
    pattern: &str,
) -> Result<Vec<String>, QueryError> {
    let needle = pattern.to_lowercase();
    let names = client.list_measurements().await?;
    Ok(names
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use time::macros::{date, datetime};

    fn range() -> DateRange {
        DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 02))
    }

    #[test]
    fn reserved_prefix_matches_any_case() {
        assert!(is_reserved_measurement("select"));
        assert!(is_reserved_measurement("SELECT_power"));
        assert!(is_reserved_measurement("SeLeCt * from x"));
        assert!(!is_reserved_measurement("W"));
        assert!(!is_reserved_measurement("sel"));
        assert!(!is_reserved_measurement("°C"));
        assert!(!is_reserved_measurement("power_select"));
    }

    #[test]
    fn range_query_binds_bounds() {
        let q = measurement_range_query("W", "givtcp", &range());
        assert_eq!(
            q.text,
            r#"SELECT * FROM "W" WHERE time >= $start AND time <= $end AND "entity_id" =~ /givtcp/"#
        );
        assert_eq!(q.params["start"], "2024-01-01T00:00:00Z");
        assert_eq!(q.params["end"], "2024-01-02T23:59:59Z");
    }

    #[test]
    fn identifiers_and_patterns_are_escaped() {
        assert_eq!(quote_identifier(r#"a"b\c"#), r#""a\"b\\c""#);
        let q = measurement_range_query("°C", "giv/tcp", &range());
        assert!(q.text.contains(r#"FROM "°C" WHERE"#));
        assert!(q.text.ends_with(r"=~ /giv\/tcp/"));
    }

    #[test]
    fn series_rows_are_tagged_and_timestamped() {
        let series = Series {
            name: "W".to_string(),
            columns: vec![
                "time".to_string(),
                "entity_id".to_string(),
                "value".to_string(),
            ],
            values: vec![
                vec![json!("2024-01-01T00:00:00Z"), json!("givtcp_pv_power"), json!(120.5)],
                vec![json!("not-a-time"), json!("givtcp_load"), json!(null)],
            ],
        };

        let rows = series_to_rows("W", series);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, Some(datetime!(2024-01-01 00:00:00 UTC)));
        assert_eq!(rows[0].measurement, "W");
        assert_eq!(rows[0].field("value"), Some(&FieldValue::Float(120.5)));
        assert_eq!(rows[0].field("time"), None);
        assert_eq!(rows[1].time, None);
        assert_eq!(rows[1].field("value"), Some(&FieldValue::Null));
    }
}
