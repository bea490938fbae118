// Trend service - Use cases over the trend data repository
use crate::application::trend_repository::{AssetTrendsRequest, TrendDataRepository};
use crate::domain::outcome::QueryOutcome;
use crate::domain::request::{
    AssetChannelInput, AssetScope, ChannelSelection, DownsampleSpec, DowntimeChannelFilter,
    DowntimePocFilter, PageSpec, RequestError, TimeRange, TimeSeriesRequest, check_tz_offset,
};
use crate::domain::trend::{
    ChannelParameter, CurrentRawScanRecord, DataPoint, DowntimeRecord, TimeSeriesRow,
    TrendCatalogEntry, TrendSummary,
};
use std::sync::Arc;
use uuid::Uuid;

/// Boundary form of the multi-asset time-series arguments.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesArgs {
    pub asset_ids: Vec<Uuid>,
    pub customer_id: Option<Uuid>,
    pub channel_ids: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub downsample_type: Option<String>,
    pub downsample_window_size: Option<String>,
    pub page_num: u32,
    pub page_size: u32,
}

/// Boundary form of the asset trend summary arguments.
#[derive(Debug, Clone, Default)]
pub struct AssetTrendsArgs {
    pub well_name: String,
    pub start_date: String,
    pub end_date: String,
    pub poc_type: Option<String>,
    pub parameters: Vec<ChannelParameter>,
    pub channel_ids: Vec<String>,
    pub trend_catalog: Vec<TrendCatalogEntry>,
    pub aggregate: Option<String>,
    pub aggregate_method: Option<String>,
    pub tz_offset_hours: f64,
    pub honor_dst: bool,
}

#[derive(Clone)]
pub struct TrendService {
    repository: Arc<dyn TrendDataRepository>,
    default_page_size: u32,
}

impl TrendService {
    pub fn new(repository: Arc<dyn TrendDataRepository>, default_page_size: u32) -> Self {
        Self {
            repository,
            default_page_size,
        }
    }

    pub async fn trend_data(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
        poc_type: Option<String>,
        channel_ids: &[String],
        start_date: &str,
        end_date: &str,
    ) -> Result<QueryOutcome<Vec<DataPoint>>, RequestError> {
        let range = TimeRange::parse(start_date, end_date)?;
        let scope = AssetScope::single(asset_id, Some(customer_id), poc_type);
        let channels = ChannelSelection::new(channel_ids.iter().cloned());
        let outcome = self.repository.get_trend_data(&scope, &channels, &range).await;
        tracing::debug!(asset_id = %asset_id, points = outcome.items.len(), "trend data");
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn trend_data_by_address(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
        poc_type: Option<String>,
        addresses: &[i32],
        param_standard_types: &[i32],
        start_date: &str,
        end_date: &str,
    ) -> Result<QueryOutcome<Vec<DataPoint>>, RequestError> {
        let range = TimeRange::parse(start_date, end_date)?;
        let scope = AssetScope::single(asset_id, Some(customer_id), poc_type);
        Ok(self
            .repository
            .get_trend_data_by_address(&scope, addresses, param_standard_types, &range)
            .await)
    }

    pub async fn latest_trend_data(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
        poc_type: Option<String>,
        channel_ids: &[String],
    ) -> QueryOutcome<Vec<DataPoint>> {
        let scope = AssetScope::single(asset_id, Some(customer_id), poc_type);
        let channels = ChannelSelection::new(channel_ids.iter().cloned());
        self.repository.get_latest_trend_data(&scope, &channels).await
    }

    pub async fn time_series_points(
        &self,
        args: &TimeSeriesArgs,
    ) -> Result<QueryOutcome<Vec<DataPoint>>, RequestError> {
        let request = self.time_series_request(args)?;
        let outcome = self.repository.get_time_series_trend_data(&request).await;
        tracing::debug!(
            assets = request.asset_ids.len(),
            points = outcome.items.len(),
            "time series points"
        );
        Ok(outcome)
    }

    pub async fn time_series_rows(
        &self,
        args: &TimeSeriesArgs,
        inputs: &[AssetChannelInput],
    ) -> Result<QueryOutcome<Vec<TimeSeriesRow>>, RequestError> {
        let request = self.time_series_request(args)?;
        Ok(self.repository.get_time_series_response(&request, inputs).await)
    }

    pub async fn downtime_by_param_standard_type(
        &self,
        filters: &[DowntimePocFilter],
        start_date: &str,
        end_date: &str,
    ) -> Result<QueryOutcome<Vec<DowntimeRecord>>, RequestError> {
        let range = TimeRange::parse(start_date, end_date)?;
        Ok(self
            .repository
            .get_downtime_by_param_standard_type(filters, &range)
            .await)
    }

    pub async fn downtime_by_channel(
        &self,
        filters: &[DowntimeChannelFilter],
        start_date: &str,
        end_date: &str,
    ) -> Result<QueryOutcome<Vec<DowntimeRecord>>, RequestError> {
        let range = TimeRange::parse(start_date, end_date)?;
        Ok(self.repository.get_downtime_by_channel(filters, &range).await)
    }

    pub async fn downtime(
        &self,
        asset_id: Uuid,
        start_date: &str,
        end_date: &str,
        channel_id: &str,
    ) -> Result<QueryOutcome<Vec<DataPoint>>, RequestError> {
        let range = TimeRange::parse(start_date, end_date)?;
        Ok(self.repository.get_downtime(asset_id, &range, channel_id).await)
    }

    pub async fn current_raw_scan(&self, asset_id: Uuid) -> QueryOutcome<Vec<CurrentRawScanRecord>> {
        self.repository.get_current_raw_scan_data(asset_id).await
    }

    pub async fn current_raw_scan_points(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
    ) -> QueryOutcome<Vec<DataPoint>> {
        self.repository
            .get_current_raw_scan_points(asset_id, customer_id)
            .await
    }

    pub async fn asset_trends(
        &self,
        asset_id: Uuid,
        args: AssetTrendsArgs,
    ) -> Result<QueryOutcome<Vec<TrendSummary>>, RequestError> {
        let request = AssetTrendsRequest {
            asset_id,
            well_name: args.well_name,
            range: TimeRange::parse(&args.start_date, &args.end_date)?,
            poc_type: args.poc_type,
            parameters: args.parameters,
            channels: ChannelSelection::new(args.channel_ids),
            trend_catalog: args.trend_catalog,
            downsample: self.downsample(args.aggregate_method.as_deref(), args.aggregate.as_deref())?,
            tz_offset_hours: check_tz_offset(args.tz_offset_hours)?,
            honor_dst: args.honor_dst,
        };
        let outcome = self.repository.get_asset_trends(&request).await;
        tracing::debug!(asset_id = %asset_id, trends = outcome.items.len(), "asset trends");
        Ok(outcome)
    }

    fn downsample(
        &self,
        aggregate: Option<&str>,
        window: Option<&str>,
    ) -> Result<Option<DownsampleSpec>, RequestError> {
        let downsample = DownsampleSpec::from_parts(aggregate, window)?;
        if let Some(spec) = &downsample {
            self.repository.check_downsample(spec)?;
        }
        Ok(downsample)
    }

    fn time_series_request(&self, args: &TimeSeriesArgs) -> Result<TimeSeriesRequest, RequestError> {
        Ok(TimeSeriesRequest {
            asset_ids: args.asset_ids.clone(),
            customer_id: args.customer_id,
            channels: ChannelSelection::new(args.channel_ids.iter().cloned()),
            range: TimeRange::parse(&args.start_date, &args.end_date)?,
            downsample: self.downsample(
                args.downsample_type.as_deref(),
                args.downsample_window_size.as_deref(),
            )?,
            page: PageSpec::new(args.page_num, args.page_size, self.default_page_size),
        })
    }
}
