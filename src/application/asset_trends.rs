// Trend summaries for one asset: catalog join, local time, statistics
use crate::application::time_conversion::TimeConverter;
use crate::application::trend_repository::AssetTrendsRequest;
use crate::domain::request::ChannelSelection;
use crate::domain::trend::{ChannelParameter, DataPoint, TrendPoint, TrendSummary};
use std::collections::HashMap;

/// Channels to fetch: the requested ones plus every threshold channel the
/// catalog refers to.
pub fn query_channels(request: &AssetTrendsRequest) -> ChannelSelection {
    let thresholds = request.trend_catalog.iter().flat_map(|entry| {
        entry
            .min_threshold_channel
            .iter()
            .chain(entry.max_threshold_channel.iter())
            .cloned()
    });
    ChannelSelection::new(request.channels.as_slice().iter().cloned().chain(thresholds))
}

/// Fold single-channel points into one summary per catalog trend, ordered by
/// display order. Catalog trends with no data are still emitted.
pub fn summarize(
    request: &AssetTrendsRequest,
    points: &[DataPoint],
    converter: &dyn TimeConverter,
) -> Vec<TrendSummary> {
    let parameters: HashMap<&str, &ChannelParameter> = request
        .parameters
        .iter()
        .map(|p| (p.channel_id.as_str(), p))
        .collect();
    let is_trend_name = |name: &str| request.trend_catalog.iter().any(|entry| entry.name == name);

    // Points resolving to a catalog trend name go to `trends`; anything else
    // is a threshold series keyed by its channel id.
    let mut trends: HashMap<&str, Vec<TrendPoint>> = HashMap::new();
    let mut thresholds: HashMap<&str, Vec<TrendPoint>> = HashMap::new();

    let mut sorted: Vec<&DataPoint> = points.iter().collect();
    sorted.sort_by_key(|p| p.time);

    for point in sorted {
        let (Some(channel), Some(value)) = (point.trend_name.as_deref(), point.value.as_deref()) else {
            continue;
        };
        let local = TrendPoint {
            time: converter.to_local(point.time, request.tz_offset_hours, request.honor_dst),
            value: value.to_string(),
        };
        match parameters.get(channel) {
            Some(parameter) if is_trend_name(parameter.description.as_str()) => {
                trends.entry(parameter.description.as_str()).or_default().push(local)
            }
            _ => thresholds.entry(channel).or_default().push(local),
        }
    }

    let mut catalog: Vec<_> = request.trend_catalog.iter().collect();
    catalog.sort_by_key(|entry| entry.display_order);

    catalog
        .into_iter()
        .map(|entry| {
            let series = trends.remove(entry.name.as_str()).unwrap_or_default();
            let stats = Stats::over(&series);
            let threshold = |channel: &Option<String>| {
                channel
                    .as_deref()
                    .and_then(|c| thresholds.get(c))
                    .cloned()
                    .unwrap_or_default()
            };

            TrendSummary {
                asset_id: request.asset_id,
                well_name: request.well_name.clone(),
                trend_name: entry.name.clone(),
                unit_of_measure: request
                    .parameters
                    .iter()
                    .find(|p| p.description == entry.name)
                    .and_then(|p| p.unit_of_measure.clone()),
                display_order: entry.display_order,
                min_threshold: threshold(&entry.min_threshold_channel),
                max_threshold: threshold(&entry.max_threshold_channel),
                latest: stats.latest,
                min: stats.min,
                max: stats.max,
                mean: stats.mean,
                points: series,
            }
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
struct Stats {
    latest: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
    mean: Option<f64>,
}

impl Stats {
    /// `series` is time-ordered.
    fn over(series: &[TrendPoint]) -> Self {
        let values: Vec<f64> = series.iter().filter_map(|p| statistic_value(&p.value)).collect();
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        Self {
            latest: values.last().copied().map(round3),
            min: values.iter().copied().reduce(f64::min).map(round3),
            max: values.iter().copied().reduce(f64::max).map(round3),
            mean: Some(round3(sum / values.len() as f64)),
        }
    }
}

/// Blank and scientific-notation values never count towards statistics.
fn statistic_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(['e', 'E']) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
