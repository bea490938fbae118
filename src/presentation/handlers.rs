// HTTP request handlers
use crate::application::trend_service::{AssetTrendsArgs, TimeSeriesArgs};
use crate::domain::outcome::QueryOutcome;
use crate::domain::request::{
    AssetChannelInput, ChannelSelection, DowntimeChannelFilter, DowntimePocFilter, RequestError,
};
use crate::domain::trend::{
    ChannelParameter, DataPoint, DowntimeRecord, TimeSeriesRow, TrendCatalogEntry, TrendSummary,
};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("invalid integer list '{0}'")]
    InvalidList(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "rejected request");
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<QueryOutcome<T>>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub customer_id: Uuid,
    pub poc_type: Option<String>,
    /// Comma-separated, e.g. `C101,C102`
    #[serde(default)]
    pub channel_ids: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub customer_id: Uuid,
    pub poc_type: Option<String>,
    #[serde(default)]
    pub addresses: String,
    #[serde(default)]
    pub param_standard_types: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub customer_id: Uuid,
    pub poc_type: Option<String>,
    #[serde(default)]
    pub channel_ids: String,
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DowntimeQuery {
    pub start_date: String,
    pub end_date: String,
    pub channel_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesBody {
    pub asset_ids: Vec<Uuid>,
    pub customer_id: Option<Uuid>,
    pub channel_ids: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub downsample_type: Option<String>,
    pub downsample_window_size: Option<String>,
    #[serde(default)]
    pub page_num: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub inputs: Vec<AssetChannelInput>,
}

impl TimeSeriesBody {
    fn args(&self) -> TimeSeriesArgs {
        TimeSeriesArgs {
            asset_ids: self.asset_ids.clone(),
            customer_id: self.customer_id,
            channel_ids: self.channel_ids.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            downsample_type: self.downsample_type.clone(),
            downsample_window_size: self.downsample_window_size.clone(),
            page_num: self.page_num,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DowntimeBody<F> {
    pub filters: Vec<F>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetTrendsBody {
    pub well_name: String,
    pub start_date: String,
    pub end_date: String,
    pub poc_type: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ChannelParameter>,
    #[serde(default)]
    pub channel_ids: Vec<String>,
    #[serde(default)]
    pub trend_catalog: Vec<TrendCatalogEntry>,
    /// Window size, e.g. `5m`
    pub aggregate: Option<String>,
    /// Aggregate function, e.g. `mean`
    pub aggregate_method: Option<String>,
    #[serde(default)]
    pub tz_offset: f64,
    #[serde(default, rename = "honorDST")]
    pub honor_dst: bool,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn trend_data(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Vec<DataPoint>> {
    let channels = ChannelSelection::parse_list(&query.channel_ids);
    let outcome = state
        .trend_service
        .trend_data(
            asset_id,
            query.customer_id,
            query.poc_type,
            channels.as_slice(),
            &query.start_date,
            &query.end_date,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn trend_data_by_address(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<Vec<DataPoint>> {
    let addresses = parse_int_list(&query.addresses)?;
    let param_standard_types = parse_int_list(&query.param_standard_types)?;
    let outcome = state
        .trend_service
        .trend_data_by_address(
            asset_id,
            query.customer_id,
            query.poc_type,
            &addresses,
            &param_standard_types,
            &query.start_date,
            &query.end_date,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn latest_trend_data(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Vec<DataPoint>> {
    let channels = ChannelSelection::parse_list(&query.channel_ids);
    let outcome = state
        .trend_service
        .latest_trend_data(asset_id, query.customer_id, query.poc_type, channels.as_slice())
        .await;
    Ok(Json(outcome))
}

/// Raw scan records, or data points when a customer is given.
pub async fn current_raw_scan(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<ScanQuery>,
) -> Response {
    match query.customer_id {
        Some(customer_id) => Json(
            state
                .trend_service
                .current_raw_scan_points(asset_id, customer_id)
                .await,
        )
        .into_response(),
        None => Json(state.trend_service.current_raw_scan(asset_id).await).into_response(),
    }
}

pub async fn downtime(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<DowntimeQuery>,
) -> ApiResult<Vec<DataPoint>> {
    let outcome = state
        .trend_service
        .downtime(asset_id, &query.start_date, &query.end_date, &query.channel_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn asset_trends(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<Uuid>,
    Json(body): Json<AssetTrendsBody>,
) -> ApiResult<Vec<TrendSummary>> {
    let args = AssetTrendsArgs {
        well_name: body.well_name,
        start_date: body.start_date,
        end_date: body.end_date,
        poc_type: body.poc_type,
        parameters: body.parameters,
        channel_ids: body.channel_ids,
        trend_catalog: body.trend_catalog,
        aggregate: body.aggregate,
        aggregate_method: body.aggregate_method,
        tz_offset_hours: body.tz_offset,
        honor_dst: body.honor_dst,
    };
    let outcome = state.trend_service.asset_trends(asset_id, args).await?;
    Ok(Json(outcome))
}

pub async fn time_series_points(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TimeSeriesBody>,
) -> ApiResult<Vec<DataPoint>> {
    let outcome = state.trend_service.time_series_points(&body.args()).await?;
    Ok(Json(outcome))
}

pub async fn time_series_rows(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TimeSeriesBody>,
) -> ApiResult<Vec<TimeSeriesRow>> {
    let outcome = state
        .trend_service
        .time_series_rows(&body.args(), &body.inputs)
        .await?;
    Ok(Json(outcome))
}

pub async fn downtime_by_param_standard_type(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DowntimeBody<DowntimePocFilter>>,
) -> ApiResult<Vec<DowntimeRecord>> {
    let outcome = state
        .trend_service
        .downtime_by_param_standard_type(&body.filters, &body.start_date, &body.end_date)
        .await?;
    Ok(Json(outcome))
}

pub async fn downtime_by_channel(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DowntimeBody<DowntimeChannelFilter>>,
) -> ApiResult<Vec<DowntimeRecord>> {
    let outcome = state
        .trend_service
        .downtime_by_channel(&body.filters, &body.start_date, &body.end_date)
        .await?;
    Ok(Json(outcome))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_int_list(raw: &str) -> Result<Vec<i32>, ApiError> {
    split_list(raw)
        .iter()
        .map(|item| item.parse().map_err(|_| ApiError::InvalidList(raw.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::trend_service::TrendService;
    use crate::domain::outcome::ErrorKind;
    use crate::infrastructure::config::StoreSettings;
    use crate::infrastructure::query::Flux;
    use crate::infrastructure::store::testing::{Reply, ScriptedConnector, table};
    use crate::infrastructure::store::{ClientAdapter, StoreError};
    use crate::infrastructure::trend_store::TrendStore;
    use std::time::Duration;

    fn state(connector: &Arc<ScriptedConnector>) -> State<Arc<AppState>> {
        let adapter = ClientAdapter::new(connector.clone(), Duration::from_secs(1));
        let store = TrendStore::new(Box::new(Flux), adapter, &StoreSettings::default());
        State(Arc::new(AppState {
            trend_service: TrendService::new(Arc::new(store), 50_000),
        }))
    }

    fn trend_query(start_date: &str) -> TrendQuery {
        TrendQuery {
            customer_id: Uuid::new_v4(),
            poc_type: None,
            channel_ids: "C101, C102".into(),
            start_date: start_date.into(),
            end_date: "2024-05-02T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_list_parsing() {
        assert_eq!(split_list(" C1,,C2 ,"), ["C1", "C2"]);
        assert_eq!(parse_int_list("101, 102").unwrap(), [101, 102]);
        assert!(matches!(parse_int_list("101,x"), Err(ApiError::InvalidList(_))));
    }

    #[tokio::test]
    async fn test_trend_data_returns_outcome() {
        let connector = ScriptedConnector::new(vec![Reply::Table(table(
            &["", "result", "table", "_time", "C101"],
            &[&[None, Some("_result"), Some("0"), Some("2024-05-01T00:00:00Z"), Some("4.2")]],
        ))]);

        let Json(outcome) = trend_data(
            state(&connector),
            Path(Uuid::new_v4()),
            Query(trend_query("2024-05-01T00:00:00Z")),
        )
        .await
        .unwrap();

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.items.len(), 1);
        assert!(connector.queries()[0].contains(r#"(r._field == "C101" or r._field == "C102")"#));
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_in_body() {
        let connector = ScriptedConnector::new(vec![Reply::Fail(StoreError::InternalServerError(
            "boom".into(),
        ))]);

        let Json(outcome) = trend_data(
            state(&connector),
            Path(Uuid::new_v4()),
            Query(trend_query("2024-05-01T00:00:00Z")),
        )
        .await
        .unwrap();

        assert_eq!(outcome.result.error_kind, ErrorKind::NotRecoverable);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_date_is_bad_request() {
        let connector = ScriptedConnector::new(vec![]);
        let err = trend_data(state(&connector), Path(Uuid::new_v4()), Query(trend_query("soon")))
            .await
            .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(connector.acquired(), 0);
    }

    #[tokio::test]
    async fn test_huge_tz_offset_is_bad_request() {
        let connector = ScriptedConnector::new(vec![]);
        let body: AssetTrendsBody = serde_json::from_value(serde_json::json!({
            "wellName": "Well 7",
            "startDate": "2024-05-01T00:00:00Z",
            "endDate": "2024-05-02T00:00:00Z",
            "channelIds": ["C101"],
            "tzOffset": 1e10,
            "honorDST": true
        }))
        .unwrap();

        let err = asset_trends(state(&connector), Path(Uuid::new_v4()), Json(body))
            .await
            .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(connector.acquired(), 0);
    }

    #[test]
    fn test_asset_trends_body_field_names() {
        let body: AssetTrendsBody = serde_json::from_value(serde_json::json!({
            "wellName": "Well 7",
            "startDate": "2024-05-01T00:00:00Z",
            "endDate": "2024-05-02T00:00:00Z",
            "channelIds": ["C101"],
            "trendCatalog": [{ "name": "Tubing Pressure", "displayOrder": 1 }],
            "aggregate": "5m",
            "aggregateMethod": "mean",
            "tzOffset": -6.0,
            "honorDST": true
        }))
        .unwrap();

        assert_eq!(body.trend_catalog[0].display_order, 1);
        assert_eq!(body.tz_offset, -6.0);
        assert!(body.honor_dst);
    }
}
