// Trend data domain models returned by the access layer
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One trend value. Single-channel queries fill `trend_name`/`value`;
/// multi-channel rows fill `column_values` instead. `total_count` and
/// `total_pages` are only ever set on element 0 of a paged result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    pub time: DateTime<Utc>,
    pub value: Option<String>,
    pub trend_name: Option<String>,
    pub asset_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_values: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,
}

impl DataPoint {
    pub fn new(time: DateTime<Utc>, trend_name: String, value: String) -> Self {
        Self {
            time,
            value: Some(value),
            trend_name: Some(trend_name),
            asset_id: None,
            column_values: None,
            total_count: None,
            total_pages: None,
        }
    }

    pub fn with_columns(
        time: DateTime<Utc>,
        asset_id: Option<Uuid>,
        column_values: BTreeMap<String, String>,
    ) -> Self {
        Self {
            time,
            value: None,
            trend_name: None,
            asset_id,
            column_values: Some(column_values),
            total_count: None,
            total_pages: None,
        }
    }

    pub fn for_asset(mut self, asset_id: Uuid) -> Self {
        self.asset_id = Some(asset_id);
        self
    }
}

/// One pivoted time bucket for one asset. `channel_ids` and `values` are
/// parallel arrays; a `None` value means the channel was requested but the
/// bucket had no numeric value for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesRow {
    pub asset_id: Uuid,
    pub poc_type_id: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub channel_ids: Vec<String>,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimeRecord {
    pub date: DateTime<Utc>,
    pub value: f64,
    pub id: Uuid,
    pub param_standard_type: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentRawScanRecord {
    pub asset_id: Uuid,
    pub channel_id: String,
    pub time: DateTime<Utc>,
    pub value: String,
}

/// Parameter catalog entry used to resolve display names and units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelParameter {
    pub channel_id: String,
    pub description: String,
    #[serde(default)]
    pub unit_of_measure: Option<String>,
}

/// A trend the caller wants summarised, with its optional threshold channels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendCatalogEntry {
    pub name: String,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub min_threshold_channel: Option<String>,
    #[serde(default)]
    pub max_threshold_channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub time: NaiveDateTime,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub asset_id: Uuid,
    pub well_name: String,
    pub trend_name: String,
    pub unit_of_measure: Option<String>,
    pub display_order: i32,
    pub points: Vec<TrendPoint>,
    pub latest: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub min_threshold: Vec<TrendPoint>,
    pub max_threshold: Vec<TrendPoint>,
}
