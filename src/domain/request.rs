// Request-side domain models: who, which channels, when, how coarse, which page
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while turning boundary input (strings) into request types.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("invalid timestamp '{0}', expected ISO-8601")]
    InvalidTimestamp(String),

    #[error("time range start {start} is after end {end}")]
    InvertedRange { start: String, end: String },

    #[error("unknown aggregate function '{0}'")]
    UnknownAggregate(String),

    #[error("invalid window size '{0}'")]
    InvalidWindow(String),

    #[error("window size '{window}' is not supported by the {dialect} store")]
    UnsupportedWindow { window: String, dialect: &'static str },

    #[error("time zone offset {0} is outside -24..=24 hours")]
    InvalidTzOffset(f64),
}

/// Hour offset from UTC as sent by callers; finite and within a day.
pub fn check_tz_offset(hours: f64) -> Result<f64, RequestError> {
    if hours.is_finite() && hours.abs() <= 24.0 {
        Ok(hours)
    } else {
        Err(RequestError::InvalidTzOffset(hours))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, RequestError> {
        if start > end {
            return Err(RequestError::InvertedRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse boundary strings. Accepts RFC3339 (any offset) or a naive
    /// `YYYY-MM-DDTHH:MM:SS[.fff]` which is taken as UTC.
    pub fn parse(start: &str, end: &str) -> Result<Self, RequestError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }
}

pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, RequestError> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(RequestError::InvalidTimestamp(raw.to_string()))
}

/// Asset/customer/POC-type dimensions of a query. Nil UUIDs are normalised
/// away on construction so "absent" and `Uuid::nil()` mean the same thing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetScope {
    pub asset_ids: Vec<Uuid>,
    pub customer_id: Option<Uuid>,
    pub poc_type: Option<String>,
}

impl AssetScope {
    pub fn single(asset_id: Uuid, customer_id: Option<Uuid>, poc_type: Option<String>) -> Self {
        Self::many(vec![asset_id], customer_id, poc_type)
    }

    pub fn many(asset_ids: Vec<Uuid>, customer_id: Option<Uuid>, poc_type: Option<String>) -> Self {
        Self {
            asset_ids: asset_ids.into_iter().filter(|id| !id.is_nil()).collect(),
            customer_id: customer_id.filter(|id| !id.is_nil()),
            poc_type: poc_type
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }

    pub fn has_assets(&self) -> bool {
        !self.asset_ids.is_empty()
    }

    pub fn has_customer(&self) -> bool {
        self.customer_id.is_some()
    }
}

/// Ordered, de-duplicated channel identifiers. Order drives output column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection(Vec<String>);

impl ChannelSelection {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for channel in channels {
            let channel = channel.into().trim().to_string();
            if !channel.is_empty() && !seen.contains(&channel) {
                seen.push(channel);
            }
        }
        Self(seen)
    }

    /// Address-variant selection: `C{address}` for each register address
    /// followed by `P{n}` for each parameter standard type.
    pub fn from_addresses(addresses: &[i32], param_standard_types: &[i32]) -> Self {
        Self::new(
            addresses
                .iter()
                .map(|a| format!("C{a}"))
                .chain(param_standard_types.iter().map(|p| param_standard_field(*p))),
        )
    }

    /// Comma-separated list as used in query strings (`C101,C102`).
    pub fn parse_list(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.0.iter().any(|c| c == channel)
    }
}

pub fn param_standard_field(param_standard_type: i32) -> String {
    format!("P{param_standard_type}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Mean,
    Last,
    First,
    Count,
    Sum,
    Min,
    Max,
    Median,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Mean => "mean",
            Aggregate::Last => "last",
            Aggregate::First => "first",
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Median => "median",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregate {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "average" | "avg" => Ok(Aggregate::Mean),
            "last" => Ok(Aggregate::Last),
            "first" => Ok(Aggregate::First),
            "count" => Ok(Aggregate::Count),
            "sum" => Ok(Aggregate::Sum),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "median" => Ok(Aggregate::Median),
            _ => Err(RequestError::UnknownAggregate(s.to_string())),
        }
    }
}

const WINDOW_UNITS: [&str; 11] = ["ns", "us", "µs", "ms", "s", "mo", "m", "h", "d", "w", "y"];

/// Window literal such as `5m`, `1h30m` or `1mo`. Shared by both dialects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSize(String);

impl WindowSize {
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        let raw = raw.trim();
        if duration_units(raw).is_some() {
            Ok(Self(raw.to_string()))
        } else {
            Err(RequestError::InvalidWindow(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn units(&self) -> Vec<&'static str> {
        duration_units(&self.0).unwrap_or_default()
    }
}

/// Units of a duration literal in order, or `None` when it is not one.
fn duration_units(raw: &str) -> Option<Vec<&'static str>> {
    if raw.is_empty() {
        return None;
    }
    let mut rest = raw;
    let mut units = Vec::new();
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        rest = &rest[digits..];
        // "mo" before "m" and "ms" before "m"; longest unit wins
        let unit = WINDOW_UNITS
            .iter()
            .copied()
            .filter(|u| rest.starts_with(*u))
            .max_by_key(|u| u.len())?;
        rest = &rest[unit.len()..];
        units.push(unit);
    }
    Some(units)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownsampleSpec {
    pub window: WindowSize,
    pub aggregate: Aggregate,
}

impl DownsampleSpec {
    /// Absent or blank type/window means raw resolution (`Ok(None)`).
    pub fn from_parts(
        aggregate: Option<&str>,
        window: Option<&str>,
    ) -> Result<Option<Self>, RequestError> {
        let aggregate = aggregate.map(str::trim).filter(|s| !s.is_empty());
        let window = window.map(str::trim).filter(|s| !s.is_empty());
        match (aggregate, window) {
            (Some(aggregate), Some(window)) => Ok(Some(Self {
                window: WindowSize::parse(window)?,
                aggregate: aggregate.parse()?,
            })),
            _ => Ok(None),
        }
    }
}

/// Offset formula used for paged queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetConvention {
    /// `(page_num - 1) * page_size`
    #[default]
    Exact,
    /// `(page_num - 1) * page_size + 1`
    PlusOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page_num: u32,
    pub page_size: u32,
}

impl PageSpec {
    pub const UNPAGED: PageSpec = PageSpec {
        page_num: 0,
        page_size: 0,
    };

    /// `page_size == 0` falls back to the configured default.
    pub fn new(page_num: u32, page_size: u32, default_page_size: u32) -> Self {
        let page_size = if page_size == 0 { default_page_size } else { page_size };
        Self { page_num, page_size }
    }

    pub fn is_paged(&self) -> bool {
        self.page_num > 0 && self.page_size > 0
    }

    pub fn offset(&self, convention: OffsetConvention) -> u64 {
        if !self.is_paged() {
            return 0;
        }
        let base = u64::from(self.page_num - 1) * u64::from(self.page_size);
        match convention {
            OffsetConvention::Exact => base,
            OffsetConvention::PlusOne => base + 1,
        }
    }
}

/// Multi-asset downsampled request shared by the two time-series operations.
#[derive(Debug, Clone)]
pub struct TimeSeriesRequest {
    pub asset_ids: Vec<Uuid>,
    pub customer_id: Option<Uuid>,
    pub channels: ChannelSelection,
    pub range: TimeRange,
    pub downsample: Option<DownsampleSpec>,
    pub page: PageSpec,
}

impl TimeSeriesRequest {
    pub fn scope(&self) -> AssetScope {
        AssetScope::many(self.asset_ids.clone(), self.customer_id, None)
    }
}

/// Per-asset channel map supplied with `get_time_series_response`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetChannelInput {
    pub asset_id: Uuid,
    pub channel_ids: Vec<String>,
}

/// Downtime filter grouped by POC type and parameter standard types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimePocFilter {
    pub poc_type: String,
    pub asset_ids: Vec<Uuid>,
    pub param_standard_types: Vec<i32>,
}

/// Downtime filter grouped by explicit channel ids.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimeChannelFilter {
    pub asset_ids: Vec<Uuid>,
    pub channel_ids: Vec<String>,
}
