// Result mapper - Raw store tables into typed trend records
use crate::domain::request::{
    AssetChannelInput, ChannelSelection, DowntimeChannelFilter, DowntimePocFilter,
    param_standard_field,
};
use crate::domain::trend::{CurrentRawScanRecord, DataPoint, DowntimeRecord, TimeSeriesRow};
use crate::infrastructure::query::{ASSET_TAG, CUSTOMER_TAG, POC_TYPE_TAG};
use crate::infrastructure::store::RawTable;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Columns that describe a row rather than carry a channel value, across
/// both dialects (Flux bookkeeping plus the shared tags).
const METADATA_COLUMNS: [&str; 11] = [
    "",
    "result",
    "table",
    "_start",
    "_stop",
    "_measurement",
    "time",
    "_time",
    ASSET_TAG,
    POC_TYPE_TAG,
    CUSTOMER_TAG,
];

pub fn is_metadata(column: &str) -> bool {
    METADATA_COLUMNS.contains(&column)
}

/// Row-per-timestamp view: the row's time, its tags, and a column → value
/// map of every non-null channel cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRow {
    pub time: DateTime<Utc>,
    pub asset_id: Option<Uuid>,
    pub poc_type: Option<String>,
    pub columns: BTreeMap<String, String>,
}

impl ColumnRow {
    pub fn value(&self, channel: &str) -> Option<&str> {
        self.columns.get(channel).map(String::as_str)
    }
}

pub fn column_rows(table: &RawTable) -> Vec<ColumnRow> {
    let Some(time_at) = table.column_index("time").or_else(|| table.column_index("_time")) else {
        if !table.is_empty() {
            tracing::debug!(columns = ?table.columns, "result has no time column");
        }
        return Vec::new();
    };
    let asset_at = table.column_index(ASSET_TAG);
    let poc_at = table.column_index(POC_TYPE_TAG);

    let mut rows = Vec::with_capacity(table.rows.len());
    for raw in &table.rows {
        let Some(time) = cell(raw, Some(time_at)).and_then(parse_time) else {
            tracing::debug!(row = ?raw, "skipping row with unparsable time");
            continue;
        };

        let columns = table
            .columns
            .iter()
            .zip(raw)
            .filter(|(name, _)| !is_metadata(name))
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.clone(), v.clone())))
            .collect();

        rows.push(ColumnRow {
            time,
            asset_id: cell(raw, asset_at).and_then(|id| Uuid::parse_str(id).ok()),
            poc_type: cell(raw, poc_at).map(str::to_string),
            columns,
        });
    }
    rows
}

/// One point per (row, requested channel) that has a value, channels in
/// selection order.
pub fn channel_points(rows: &[ColumnRow], channels: &ChannelSelection) -> Vec<DataPoint> {
    rows.iter()
        .flat_map(|row| {
            channels.as_slice().iter().filter_map(move |channel| {
                row.value(channel).map(|value| {
                    let mut point = DataPoint::new(row.time, channel.clone(), value.to_string());
                    point.asset_id = row.asset_id;
                    point
                })
            })
        })
        .collect()
}

/// At most one point per channel: the newest row holding a value for it.
pub fn latest_points(rows: &[ColumnRow], channels: &ChannelSelection) -> Vec<DataPoint> {
    channels
        .as_slice()
        .iter()
        .filter_map(|channel| {
            rows.iter()
                .filter_map(|row| row.value(channel).map(|value| (row, value)))
                .max_by_key(|(row, _)| row.time)
                .map(|(row, value)| {
                    let mut point = DataPoint::new(row.time, channel.clone(), value.to_string());
                    point.asset_id = row.asset_id;
                    point
                })
        })
        .collect()
}

/// Multi-channel rows carried as `column_values`.
pub fn row_points(rows: Vec<ColumnRow>) -> Vec<DataPoint> {
    rows.into_iter()
        .map(|row| DataPoint::with_columns(row.time, row.asset_id, row.columns))
        .collect()
}

/// Pivot into one row per (asset, time bucket) with parallel channel/value
/// arrays. Only channels requested for that asset are kept; a requested
/// channel with no numeric value in the bucket is kept as `None`.
pub fn pivot_rows(table: &RawTable, inputs: &[AssetChannelInput]) -> Vec<TimeSeriesRow> {
    let mut requested: HashMap<Uuid, HashSet<&str>> = HashMap::new();
    for input in inputs {
        requested
            .entry(input.asset_id)
            .or_default()
            .extend(input.channel_ids.iter().map(String::as_str));
    }

    let time_at = table.column_index("time").or_else(|| table.column_index("_time"));
    let asset_at = table.column_index(ASSET_TAG);
    let poc_at = table.column_index(POC_TYPE_TAG);

    let mut output = Vec::new();
    for raw in &table.rows {
        let Some(asset_id) = cell(raw, asset_at).and_then(|id| Uuid::parse_str(id).ok()) else {
            continue;
        };
        let Some(wanted) = requested.get(&asset_id) else {
            continue;
        };
        let Some(timestamp) = cell(raw, time_at).and_then(parse_time) else {
            continue;
        };

        let mut channel_ids = Vec::new();
        let mut values = Vec::new();
        for (index, column) in table.columns.iter().enumerate() {
            if is_metadata(column) || !wanted.contains(column.as_str()) {
                continue;
            }
            channel_ids.push(column.clone());
            values.push(cell(raw, Some(index)).and_then(parse_number));
        }

        output.push(TimeSeriesRow {
            asset_id,
            poc_type_id: cell(raw, poc_at).and_then(|p| p.trim().parse().ok()),
            timestamp,
            channel_ids,
            values,
        });
    }
    output
}

pub fn downtime_by_param_type(rows: &[ColumnRow], filters: &[DowntimePocFilter]) -> Vec<DowntimeRecord> {
    let mut records = Vec::new();
    for row in rows {
        let (Some(asset_id), Some(poc_type)) = (row.asset_id, row.poc_type.as_deref()) else {
            continue;
        };

        let mut seen = HashSet::new();
        let param_types = filters
            .iter()
            .filter(|f| f.poc_type.trim() == poc_type && f.asset_ids.contains(&asset_id))
            .flat_map(|f| f.param_standard_types.iter().copied())
            .filter(|pst| seen.insert(*pst));

        for pst in param_types {
            if let Some(value) = row.value(&param_standard_field(pst)).and_then(parse_number) {
                records.push(DowntimeRecord {
                    date: row.time,
                    value,
                    id: asset_id,
                    param_standard_type: Some(pst),
                });
            }
        }
    }
    records
}

pub fn downtime_by_channel(rows: &[ColumnRow], filters: &[DowntimeChannelFilter]) -> Vec<DowntimeRecord> {
    let mut records = Vec::new();
    for row in rows {
        let Some(asset_id) = row.asset_id else {
            continue;
        };

        let mut seen = HashSet::new();
        let channels = filters
            .iter()
            .filter(|f| f.asset_ids.contains(&asset_id))
            .flat_map(|f| f.channel_ids.iter())
            .filter(|channel| seen.insert(channel.as_str()));

        for channel in channels {
            if let Some(value) = row.value(channel).and_then(parse_number) {
                records.push(DowntimeRecord {
                    date: row.time,
                    value,
                    id: asset_id,
                    param_standard_type: None,
                });
            }
        }
    }
    records
}

/// Newest value of every channel column, ordered by channel id.
pub fn current_scan_records(rows: &[ColumnRow], asset_id: Uuid) -> Vec<CurrentRawScanRecord> {
    let mut newest: BTreeMap<&str, (DateTime<Utc>, &str)> = BTreeMap::new();
    for row in rows {
        for (channel, value) in &row.columns {
            match newest.get(channel.as_str()) {
                Some((time, _)) if *time >= row.time => {}
                _ => {
                    newest.insert(channel.as_str(), (row.time, value.as_str()));
                }
            }
        }
    }

    newest
        .into_iter()
        .map(|(channel, (time, value))| CurrentRawScanRecord {
            asset_id,
            channel_id: channel.to_string(),
            time,
            value: value.to_string(),
        })
        .collect()
}

fn cell(row: &[Option<String>], index: Option<usize>) -> Option<&str> {
    index.and_then(|i| row.get(i)).and_then(|c| c.as_deref())
}

pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
