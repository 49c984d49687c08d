use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::geometry::Point;

pub fn space_number_to_sql(value: u32) -> i64 {
    i64::from(value)
}

pub fn space_number_from_sql(value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| anyhow!("space_number contains invalid value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn coordinates_to_json(points: &[Point]) -> Result<String> {
    serde_json::to_string(points).context("failed to serialize zone coordinates")
}

pub fn coordinates_from_json(raw: &str) -> Result<Vec<Point>> {
    serde_json::from_str(raw).context("failed to parse zone coordinates")
}
