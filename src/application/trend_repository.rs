// Repository trait for trend data access
use crate::domain::outcome::QueryOutcome;
use crate::domain::request::{
    AssetChannelInput, AssetScope, ChannelSelection, DowntimeChannelFilter, DowntimePocFilter,
    DownsampleSpec, RequestError, TimeRange, TimeSeriesRequest,
};
use crate::domain::trend::{
    ChannelParameter, CurrentRawScanRecord, DataPoint, DowntimeRecord, TimeSeriesRow,
    TrendCatalogEntry, TrendSummary,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Inputs of the enriched per-asset trend summary.
#[derive(Debug, Clone)]
pub struct AssetTrendsRequest {
    pub asset_id: Uuid,
    pub well_name: String,
    pub range: TimeRange,
    pub poc_type: Option<String>,
    pub parameters: Vec<ChannelParameter>,
    pub channels: ChannelSelection,
    pub trend_catalog: Vec<TrendCatalogEntry>,
    pub downsample: Option<DownsampleSpec>,
    pub tz_offset_hours: f64,
    pub honor_dst: bool,
}

/// Store-agnostic trend data contract. Every call returns whatever items it
/// managed to map plus the classified result; none of them return `Err`.
/// Calls missing a required identifier return an empty outcome without
/// touching the store.
#[async_trait]
pub trait TrendDataRepository: Send + Sync {
    /// Raw points for one asset's channels. Requires asset and customer.
    async fn get_trend_data(
        &self,
        scope: &AssetScope,
        channels: &ChannelSelection,
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DataPoint>>;

    /// Address/param-type variant: `C{address}` and `P{n}` fields.
    async fn get_trend_data_by_address(
        &self,
        scope: &AssetScope,
        addresses: &[i32],
        param_standard_types: &[i32],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DataPoint>>;

    /// Newest point per channel.
    async fn get_latest_trend_data(
        &self,
        scope: &AssetScope,
        channels: &ChannelSelection,
    ) -> QueryOutcome<Vec<DataPoint>>;

    /// Multi-asset, optionally downsampled and paged, as multi-column points.
    async fn get_time_series_trend_data(
        &self,
        request: &TimeSeriesRequest,
    ) -> QueryOutcome<Vec<DataPoint>>;

    /// Same query pivoted per asset against the caller's channel map.
    async fn get_time_series_response(
        &self,
        request: &TimeSeriesRequest,
        inputs: &[AssetChannelInput],
    ) -> QueryOutcome<Vec<TimeSeriesRow>>;

    async fn get_downtime_by_param_standard_type(
        &self,
        filters: &[DowntimePocFilter],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DowntimeRecord>>;

    async fn get_downtime_by_channel(
        &self,
        filters: &[DowntimeChannelFilter],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DowntimeRecord>>;

    async fn get_downtime(
        &self,
        asset_id: Uuid,
        range: &TimeRange,
        channel_id: &str,
    ) -> QueryOutcome<Vec<DataPoint>>;

    /// Newest value per channel. InfluxQL reads the single newest row, so a
    /// channel missing from that row is absent; Flux takes the newest point
    /// of every channel series.
    async fn get_current_raw_scan_data(&self, asset_id: Uuid) -> QueryOutcome<Vec<CurrentRawScanRecord>>;

    async fn get_current_raw_scan_points(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
    ) -> QueryOutcome<Vec<DataPoint>>;

    async fn get_asset_trends(&self, request: &AssetTrendsRequest) -> QueryOutcome<Vec<TrendSummary>>;

    /// Rejects downsampling the store cannot express, before any call.
    fn check_downsample(&self, _downsample: &DownsampleSpec) -> Result<(), RequestError> {
        Ok(())
    }
}
