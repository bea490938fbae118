// Trend store - TrendDataRepository over either store dialect
use crate::application::asset_trends::{query_channels, summarize};
use crate::application::time_conversion::{TimeConverter, UsDaylightConverter};
use crate::application::trend_repository::{AssetTrendsRequest, TrendDataRepository};
use crate::domain::outcome::{PageInfo, QueryOutcome};
use crate::domain::request::{
    AssetChannelInput, AssetScope, ChannelSelection, DownsampleSpec, DowntimeChannelFilter,
    DowntimePocFilter, OffsetConvention, PageSpec, RequestError, TimeRange, TimeSeriesRequest,
    param_standard_field,
};
use crate::domain::trend::{
    CurrentRawScanRecord, DataPoint, DowntimeRecord, TimeSeriesRow, TrendSummary,
};
use crate::infrastructure::config::{BackendKind, StoreSettings};
use crate::infrastructure::error_classifier::classify;
use crate::infrastructure::mapping;
use crate::infrastructure::pagination::{apply_carrier, extract_total_count, page_info};
use crate::infrastructure::query::{
    ASSET_TAG, CUSTOMER_TAG, Flux, InfluxQl, POC_TYPE_TAG, Predicate, QueryDialect, QuerySpec,
    Window,
};
use crate::infrastructure::store::{
    ClientAdapter, FluxConnector, InfluxQlConnector, RawTable, StoreConnector, StoreError,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct TrendStore {
    dialect: Box<dyn QueryDialect>,
    adapter: ClientAdapter,
    bucket: String,
    measurement: String,
    page_size: u32,
    offset_convention: OffsetConvention,
    converter: Arc<dyn TimeConverter>,
}

/// What one data (+ count) round trip produced before it finished or failed.
#[derive(Default)]
struct Fetched {
    table: RawTable,
    page: Option<PageInfo>,
    error: Option<StoreError>,
}

impl TrendStore {
    pub fn new(dialect: Box<dyn QueryDialect>, adapter: ClientAdapter, settings: &StoreSettings) -> Self {
        Self {
            dialect,
            adapter,
            bucket: settings.bucket.clone(),
            measurement: settings.measurement.clone(),
            page_size: settings.page_size,
            offset_convention: settings.offset_convention,
            converter: Arc::new(UsDaylightConverter),
        }
    }

    pub fn influxql(settings: &StoreSettings) -> Self {
        let connector = Arc::new(InfluxQlConnector::new(
            settings.host.clone(),
            settings.token.clone(),
            settings.database.clone(),
            settings.retention_policy.clone(),
        ));
        Self::new(Box::new(InfluxQl), Self::adapter(connector, settings), settings)
    }

    pub fn flux(settings: &StoreSettings) -> Self {
        let connector = Arc::new(FluxConnector::new(
            settings.host.clone(),
            settings.token.clone(),
            settings.org.clone(),
        ));
        Self::new(Box::new(Flux), Self::adapter(connector, settings), settings)
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        match settings.backend {
            BackendKind::InfluxQl => Self::influxql(settings),
            BackendKind::Flux => Self::flux(settings),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn TimeConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn dialect_name(&self) -> &'static str {
        self.dialect.name()
    }

    fn adapter(connector: Arc<dyn StoreConnector>, settings: &StoreSettings) -> ClientAdapter {
        ClientAdapter::new(connector, Duration::from_secs(settings.query_timeout_secs))
    }

    fn query(&self) -> QuerySpec {
        QuerySpec::new(self.bucket.as_str(), self.measurement.as_str())
    }

    /// Asset, customer and POC type filters for a scope. Absent dimensions
    /// add no filter.
    fn scoped(&self, scope: &AssetScope) -> QuerySpec {
        let mut spec = self.query().filter(Predicate::tag(ASSET_TAG, &scope.asset_ids));
        if let Some(customer_id) = scope.customer_id {
            spec = spec.filter(Predicate::tag(CUSTOMER_TAG, [customer_id]));
        }
        if let Some(poc_type) = &scope.poc_type {
            spec = spec.filter(Predicate::tag(POC_TYPE_TAG, [poc_type]));
        }
        spec
    }

    fn window(&self, page: PageSpec) -> Option<Window> {
        let page = PageSpec::new(page.page_num, page.page_size, self.page_size);
        Window::for_page(&page, self.offset_convention)
    }

    async fn run(&self, spec: &QuerySpec) -> Fetched {
        let mut fetched = Fetched::default();
        if let Err(err) = self.run_into(spec, &mut fetched).await {
            fetched.error = Some(err);
        }
        tracing::debug!(
            dialect = self.dialect.name(),
            rows = fetched.table.rows.len(),
            failed = fetched.error.is_some(),
            "store round trip finished"
        );
        fetched
    }

    /// The lease lives until this returns, covering the count query too.
    async fn run_into(&self, spec: &QuerySpec, fetched: &mut Fetched) -> Result<(), StoreError> {
        let query = self.dialect.render(spec)?;
        let count_query = spec
            .page
            .map(|_| self.dialect.render_count(spec))
            .transpose()?;

        let mut lease = self.adapter.acquire()?;
        fetched.table = lease.execute(&query).await?;

        if let (Some(count_query), Some(window)) = (count_query, spec.page) {
            let counts = lease.execute(&count_query).await?;
            let page_size = u32::try_from(window.limit).unwrap_or(self.page_size);
            fetched.page = Some(page_info(extract_total_count(&counts), page_size));
        }
        Ok(())
    }

    fn finish<T>(&self, operation: &'static str, items: T, fetched: Fetched) -> QueryOutcome<T> {
        let outcome = match fetched.error {
            None => QueryOutcome::ok(items),
            Some(err) => {
                let result = classify(&err);
                tracing::warn!(
                    operation,
                    dialect = self.dialect.name(),
                    kind = ?result.error_kind,
                    error = %err,
                    "trend query failed"
                );
                QueryOutcome::failed(items, result)
            }
        };
        outcome.with_page(fetched.page)
    }

    async fn channel_query(
        &self,
        operation: &'static str,
        scope: &AssetScope,
        channels: &ChannelSelection,
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DataPoint>> {
        if !scope.has_assets() || !scope.has_customer() || channels.is_empty() {
            tracing::debug!(operation, "missing asset, customer or channels; skipping store");
            return QueryOutcome::empty();
        }

        let spec = self
            .scoped(scope)
            .fields(channels.as_slice().iter().cloned())
            .range(*range);
        let fetched = self.run(&spec).await;

        let asset_id = scope.asset_ids[0];
        let points = mapping::channel_points(&mapping::column_rows(&fetched.table), channels)
            .into_iter()
            .map(|p| p.for_asset(asset_id))
            .collect();
        self.finish(operation, points, fetched)
    }

    fn time_series_spec(&self, request: &TimeSeriesRequest) -> Option<QuerySpec> {
        let scope = request.scope();
        if !scope.has_assets() || request.channels.is_empty() {
            return None;
        }
        Some(
            self.scoped(&scope)
                .fields(request.channels.as_slice().iter().cloned())
                .range(request.range)
                .downsample(request.downsample.clone())
                .group_by([ASSET_TAG, POC_TYPE_TAG])
                .page(self.window(request.page)),
        )
    }

    async fn latest_rows(&self, scope: &AssetScope) -> (Vec<mapping::ColumnRow>, Fetched) {
        let spec = self.scoped(scope).latest();
        let mut fetched = self.run(&spec).await;
        let rows = mapping::column_rows(&std::mem::take(&mut fetched.table));
        (rows, fetched)
    }
}

#[async_trait]
impl TrendDataRepository for TrendStore {
    async fn get_trend_data(
        &self,
        scope: &AssetScope,
        channels: &ChannelSelection,
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DataPoint>> {
        self.channel_query("get_trend_data", scope, channels, range).await
    }

    async fn get_trend_data_by_address(
        &self,
        scope: &AssetScope,
        addresses: &[i32],
        param_standard_types: &[i32],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DataPoint>> {
        let channels = ChannelSelection::from_addresses(addresses, param_standard_types);
        self.channel_query("get_trend_data_by_address", scope, &channels, range)
            .await
    }

    async fn get_latest_trend_data(
        &self,
        scope: &AssetScope,
        channels: &ChannelSelection,
    ) -> QueryOutcome<Vec<DataPoint>> {
        if !scope.has_assets() || !scope.has_customer() || channels.is_empty() {
            return QueryOutcome::empty();
        }

        let spec = self
            .scoped(scope)
            .fields(channels.as_slice().iter().cloned())
            .latest();
        let fetched = self.run(&spec).await;

        let asset_id = scope.asset_ids[0];
        let points = mapping::latest_points(&mapping::column_rows(&fetched.table), channels)
            .into_iter()
            .map(|p| p.for_asset(asset_id))
            .collect();
        self.finish("get_latest_trend_data", points, fetched)
    }

    async fn get_time_series_trend_data(
        &self,
        request: &TimeSeriesRequest,
    ) -> QueryOutcome<Vec<DataPoint>> {
        let Some(spec) = self.time_series_spec(request) else {
            return QueryOutcome::empty();
        };
        let fetched = self.run(&spec).await;

        let mut points = mapping::row_points(mapping::column_rows(&fetched.table));
        if let Some(info) = fetched.page {
            apply_carrier(&mut points, info);
        }
        self.finish("get_time_series_trend_data", points, fetched)
    }

    async fn get_time_series_response(
        &self,
        request: &TimeSeriesRequest,
        inputs: &[AssetChannelInput],
    ) -> QueryOutcome<Vec<TimeSeriesRow>> {
        if inputs.is_empty() {
            return QueryOutcome::empty();
        }
        let Some(spec) = self.time_series_spec(request) else {
            return QueryOutcome::empty();
        };
        let fetched = self.run(&spec).await;

        let rows = mapping::pivot_rows(&fetched.table, inputs);
        self.finish("get_time_series_response", rows, fetched)
    }

    async fn get_downtime_by_param_standard_type(
        &self,
        filters: &[DowntimePocFilter],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DowntimeRecord>> {
        let filters: Vec<DowntimePocFilter> = filters
            .iter()
            .map(|f| DowntimePocFilter {
                poc_type: f.poc_type.trim().to_string(),
                asset_ids: f.asset_ids.iter().copied().filter(|id| !id.is_nil()).collect(),
                param_standard_types: f.param_standard_types.clone(),
            })
            .filter(|f| !f.poc_type.is_empty() && !f.asset_ids.is_empty() && !f.param_standard_types.is_empty())
            .collect();
        if filters.is_empty() {
            return QueryOutcome::empty();
        }

        let groups: Vec<Vec<Predicate>> = filters
            .iter()
            .map(|f| {
                vec![
                    Predicate::tag(POC_TYPE_TAG, [&f.poc_type]),
                    Predicate::tag(ASSET_TAG, &f.asset_ids),
                ]
            })
            .collect();
        let fields = ChannelSelection::new(
            filters
                .iter()
                .flat_map(|f| f.param_standard_types.iter().map(|p| param_standard_field(*p))),
        );
        let spec = self
            .query()
            .filter(Predicate::AnyOf(groups))
            .fields(fields.as_slice().iter().cloned())
            .range(*range)
            .group_by([ASSET_TAG, POC_TYPE_TAG]);
        let fetched = self.run(&spec).await;

        let records = mapping::downtime_by_param_type(&mapping::column_rows(&fetched.table), &filters);
        self.finish("get_downtime_by_param_standard_type", records, fetched)
    }

    async fn get_downtime_by_channel(
        &self,
        filters: &[DowntimeChannelFilter],
        range: &TimeRange,
    ) -> QueryOutcome<Vec<DowntimeRecord>> {
        let filters: Vec<DowntimeChannelFilter> = filters
            .iter()
            .map(|f| DowntimeChannelFilter {
                asset_ids: f.asset_ids.iter().copied().filter(|id| !id.is_nil()).collect(),
                channel_ids: ChannelSelection::new(f.channel_ids.iter().cloned()).as_slice().to_vec(),
            })
            .filter(|f| !f.asset_ids.is_empty() && !f.channel_ids.is_empty())
            .collect();
        if filters.is_empty() {
            return QueryOutcome::empty();
        }

        let groups: Vec<Vec<Predicate>> = filters
            .iter()
            .map(|f| vec![Predicate::tag(ASSET_TAG, &f.asset_ids)])
            .collect();
        let fields = ChannelSelection::new(filters.iter().flat_map(|f| f.channel_ids.iter().cloned()));
        let spec = self
            .query()
            .filter(Predicate::AnyOf(groups))
            .fields(fields.as_slice().iter().cloned())
            .range(*range)
            .group_by([ASSET_TAG]);
        let fetched = self.run(&spec).await;

        let records = mapping::downtime_by_channel(&mapping::column_rows(&fetched.table), &filters);
        self.finish("get_downtime_by_channel", records, fetched)
    }

    async fn get_downtime(
        &self,
        asset_id: Uuid,
        range: &TimeRange,
        channel_id: &str,
    ) -> QueryOutcome<Vec<DataPoint>> {
        let scope = AssetScope::single(asset_id, None, None);
        let channels = ChannelSelection::new([channel_id]);
        if !scope.has_assets() || channels.is_empty() {
            return QueryOutcome::empty();
        }

        let spec = self
            .scoped(&scope)
            .fields(channels.as_slice().iter().cloned())
            .range(*range);
        let fetched = self.run(&spec).await;

        let points = mapping::channel_points(&mapping::column_rows(&fetched.table), &channels)
            .into_iter()
            .map(|p| p.for_asset(asset_id))
            .collect();
        self.finish("get_downtime", points, fetched)
    }

    async fn get_current_raw_scan_data(&self, asset_id: Uuid) -> QueryOutcome<Vec<CurrentRawScanRecord>> {
        let scope = AssetScope::single(asset_id, None, None);
        if !scope.has_assets() {
            return QueryOutcome::empty();
        }

        let (rows, fetched) = self.latest_rows(&scope).await;
        let records = mapping::current_scan_records(&rows, asset_id);
        self.finish("get_current_raw_scan_data", records, fetched)
    }

    async fn get_current_raw_scan_points(
        &self,
        asset_id: Uuid,
        customer_id: Uuid,
    ) -> QueryOutcome<Vec<DataPoint>> {
        let scope = AssetScope::single(asset_id, Some(customer_id), None);
        if !scope.has_assets() || !scope.has_customer() {
            return QueryOutcome::empty();
        }

        let (rows, fetched) = self.latest_rows(&scope).await;
        let points = mapping::current_scan_records(&rows, asset_id)
            .into_iter()
            .map(|r| DataPoint::new(r.time, r.channel_id, r.value).for_asset(asset_id))
            .collect();
        self.finish("get_current_raw_scan_points", points, fetched)
    }

    fn check_downsample(&self, downsample: &DownsampleSpec) -> Result<(), RequestError> {
        if self.dialect.supports_window(&downsample.window) {
            Ok(())
        } else {
            Err(RequestError::UnsupportedWindow {
                window: downsample.window.as_str().to_string(),
                dialect: self.dialect.name(),
            })
        }
    }

    async fn get_asset_trends(&self, request: &AssetTrendsRequest) -> QueryOutcome<Vec<TrendSummary>> {
        let scope = AssetScope::single(request.asset_id, None, request.poc_type.clone());
        if !scope.has_assets() {
            return QueryOutcome::empty();
        }

        let channels = query_channels(request);
        if channels.is_empty() {
            return QueryOutcome::ok(summarize(request, &[], self.converter.as_ref()));
        }

        let spec = self
            .scoped(&scope)
            .fields(channels.as_slice().iter().cloned())
            .range(request.range)
            .downsample(request.downsample.clone());
        let fetched = self.run(&spec).await;

        let points = mapping::channel_points(&mapping::column_rows(&fetched.table), &channels);
        let summaries = summarize(request, &points, self.converter.as_ref());
        self.finish("get_asset_trends", summaries, fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::ErrorKind;
    use crate::domain::trend::{ChannelParameter, TrendCatalogEntry};
    use crate::infrastructure::store::testing::{Reply, ScriptedConnector, table};

    const ASSET: &str = "8f8f4d9e-57a4-4b7c-9d3a-0f7f1f0c2a11";
    const CUSTOMER: &str = "c0ffee00-0000-4000-8000-000000000001";
    const OTHER: &str = "1b2c3d4e-0000-4000-8000-000000000002";

    fn uuid(raw: &str) -> Uuid {
        Uuid::parse_str(raw).unwrap()
    }

    fn range() -> TimeRange {
        TimeRange::parse("2024-05-01T00:00:00Z", "2024-05-02T00:00:00Z").unwrap()
    }

    fn store_with(dialect: Box<dyn QueryDialect>, connector: &Arc<ScriptedConnector>) -> TrendStore {
        let adapter = ClientAdapter::new(connector.clone(), Duration::from_millis(100));
        TrendStore::new(dialect, adapter, &StoreSettings::default())
    }

    fn influxql(replies: Vec<Reply>) -> (TrendStore, Arc<ScriptedConnector>) {
        let connector = ScriptedConnector::new(replies);
        (store_with(Box::new(InfluxQl), &connector), connector)
    }

    fn scope() -> AssetScope {
        AssetScope::single(uuid(ASSET), Some(uuid(CUSTOMER)), None)
    }

    #[tokio::test]
    async fn test_missing_identifiers_never_touch_the_store() {
        let (store, connector) = influxql(vec![]);
        let channels = ChannelSelection::new(["C101"]);

        let nil_asset = AssetScope::single(Uuid::nil(), Some(uuid(CUSTOMER)), None);
        assert!(store.get_trend_data(&nil_asset, &channels, &range()).await.items.is_empty());

        let no_customer = AssetScope::single(uuid(ASSET), None, None);
        assert!(store.get_latest_trend_data(&no_customer, &channels).await.items.is_empty());

        let no_channels = ChannelSelection::default();
        assert!(store.get_trend_data(&scope(), &no_channels, &range()).await.items.is_empty());

        assert!(store.get_current_raw_scan_data(Uuid::nil()).await.items.is_empty());
        assert!(store.get_downtime(uuid(ASSET), &range(), " ").await.items.is_empty());

        let empty_filter = DowntimeChannelFilter {
            asset_ids: vec![Uuid::nil()],
            channel_ids: vec!["C1".into()],
        };
        let outcome = store.get_downtime_by_channel(&[empty_filter], &range()).await;
        assert!(outcome.items.is_empty());
        assert!(outcome.result.is_ok());

        assert_eq!(connector.acquired(), 0);
    }

    #[tokio::test]
    async fn test_trend_data_maps_points_and_releases_client() {
        let (store, connector) = influxql(vec![Reply::Table(table(
            &["time", "C101", "C102"],
            &[
                &[Some("2024-05-01T00:00:00Z"), Some("1.5"), Some("7")],
                &[Some("2024-05-01T00:01:00Z"), None, Some("8")],
            ],
        ))]);

        let outcome = store
            .get_trend_data(&scope(), &ChannelSelection::new(["C101", "C102"]), &range())
            .await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.items.len(), 3);
        assert!(outcome.items.iter().all(|p| p.asset_id == Some(uuid(ASSET))));
        assert_eq!(outcome.page, None);

        let queries = connector.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].starts_with(r#"SELECT "C101", "C102" FROM "AssetData""#));
        assert!(queries[0].contains(&format!(r#""CustomerID" = '{CUSTOMER}'"#)));
        assert_eq!((connector.acquired(), connector.released()), (1, 1));
    }

    #[tokio::test]
    async fn test_address_variant_projects_c_and_p_fields() {
        let (store, connector) = influxql(vec![]);
        store
            .get_trend_data_by_address(&scope(), &[101, 102], &[179], &range())
            .await;
        assert!(connector.queries()[0].starts_with(r#"SELECT "C101", "C102", "P179" FROM"#));
    }

    #[tokio::test]
    async fn test_latest_returns_one_point_per_channel() {
        let (store, connector) = influxql(vec![Reply::Table(table(
            &["time", "C101", "C102"],
            &[
                &[Some("2024-05-01T10:00:00Z"), Some("3"), None],
                &[Some("2024-05-01T09:00:00Z"), None, Some("4")],
            ],
        ))]);

        let outcome = store
            .get_latest_trend_data(&scope(), &ChannelSelection::new(["C101", "C102"]))
            .await;

        assert_eq!(outcome.items.len(), 2);
        let query = &connector.queries()[0];
        assert_eq!(query.matches("ORDER BY time DESC LIMIT 1").count(), 2);
        assert!(!query.contains("time >="));
    }

    #[tokio::test]
    async fn test_paged_time_series_carries_totals() {
        let (store, connector) = influxql(vec![
            Reply::Table(table(
                &["AssetID", "POCType", "time", "C101"],
                &[
                    &[Some(ASSET), Some("8"), Some("2024-05-01T00:00:00Z"), Some("1")],
                    &[Some(ASSET), Some("8"), Some("2024-05-01T00:05:00Z"), Some("2")],
                ],
            )),
            Reply::Table(table(
                &["time", "count_C101"],
                &[&[Some("1970-01-01T00:00:00Z"), Some("100001")]],
            )),
        ]);

        let request = TimeSeriesRequest {
            asset_ids: vec![uuid(ASSET), Uuid::nil()],
            customer_id: None,
            channels: ChannelSelection::new(["C101"]),
            range: range(),
            downsample: DownsampleSpec::from_parts(Some("mean"), Some("5m")).unwrap(),
            page: PageSpec::new(2, 0, 50_000),
        };
        let outcome = store.get_time_series_trend_data(&request).await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.page.map(|p| (p.total_count, p.total_pages)), Some((100_001, 3)));
        assert_eq!(outcome.items[0].total_pages, Some(3));
        assert_eq!(outcome.items[1].total_count, None);
        assert_eq!(
            outcome.items[0].column_values.as_ref().and_then(|c| c.get("C101")).map(String::as_str),
            Some("1")
        );

        let queries = connector.queries();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].contains(r#"mean("C101") AS "C101""#));
        assert!(queries[0].ends_with("LIMIT 50000 OFFSET 50000"));
        assert!(queries[1].starts_with("SELECT count(*) FROM (SELECT"));
        assert!(!queries[0].contains(&Uuid::nil().to_string()));
        assert_eq!((connector.acquired(), connector.released()), (1, 1));
    }

    #[tokio::test]
    async fn test_multi_asset_pages_are_global_on_both_dialects() {
        let request = TimeSeriesRequest {
            asset_ids: vec![uuid(ASSET), uuid(OTHER)],
            customer_id: None,
            channels: ChannelSelection::new(["C1"]),
            range: range(),
            downsample: None,
            page: PageSpec::new(1, 10, 50_000),
        };

        let (store, connector) = influxql(vec![]);
        store.get_time_series_trend_data(&request).await;
        let query = &connector.queries()[0];
        let grouped_end = query.find(r#"GROUP BY "AssetID", "POCType")"#).unwrap();
        let paging = query.find("LIMIT 10 OFFSET 0").unwrap();
        assert!(query.starts_with("SELECT * FROM (SELECT \"C1\" FROM"));
        assert!(paging > grouped_end);
        assert!(query.ends_with(") ORDER BY time LIMIT 10 OFFSET 0"));

        let connector = ScriptedConnector::new(vec![]);
        let store = store_with(Box::new(Flux), &connector);
        store.get_time_series_trend_data(&request).await;
        let query = &connector.queries()[0];
        assert!(query.find("group()").unwrap() < query.find("limit(n: 10, offset: 0)").unwrap());
    }

    #[test]
    fn test_downsample_checked_against_dialect() {
        let monthly = DownsampleSpec::from_parts(Some("mean"), Some("1mo")).unwrap().unwrap();
        let hourly = DownsampleSpec::from_parts(Some("mean"), Some("1h")).unwrap().unwrap();

        let (store, _connector) = influxql(vec![]);
        assert_eq!(
            store.check_downsample(&monthly),
            Err(RequestError::UnsupportedWindow { window: "1mo".into(), dialect: "influxql" })
        );
        assert_eq!(store.check_downsample(&hourly), Ok(()));

        let flux = store_with(Box::new(Flux), &ScriptedConnector::new(vec![]));
        assert_eq!(flux.check_downsample(&monthly), Ok(()));
    }

    #[tokio::test]
    async fn test_time_series_response_pivots_with_nulls() {
        let (store, _connector) = influxql(vec![Reply::Table(table(
            &["AssetID", "POCType", "time", "C1", "C2", "C3"],
            &[&[Some(ASSET), Some("8"), Some("2024-05-01T00:00:00Z"), Some("1"), None, Some("3")]],
        ))]);

        let request = TimeSeriesRequest {
            asset_ids: vec![uuid(ASSET)],
            customer_id: Some(uuid(CUSTOMER)),
            channels: ChannelSelection::new(["C1", "C2", "C3"]),
            range: range(),
            downsample: None,
            page: PageSpec::UNPAGED,
        };
        let inputs = [AssetChannelInput {
            asset_id: uuid(ASSET),
            channel_ids: vec!["C1".into(), "C2".into(), "C3".into()],
        }];
        let outcome = store.get_time_series_response(&request, &inputs).await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].values, [Some(1.0), None, Some(3.0)]);
        assert_eq!(outcome.items[0].poc_type_id, Some(8));
    }

    #[tokio::test]
    async fn test_timeout_is_recoverable_and_client_released() {
        let (store, connector) = influxql(vec![Reply::Hang]);
        let outcome = store
            .get_trend_data(&scope(), &ChannelSelection::new(["C101"]), &range())
            .await;

        assert!(outcome.items.is_empty());
        assert_eq!(outcome.result.error_kind, ErrorKind::LikelyRecoverable);
        assert_eq!((connector.acquired(), connector.released()), (1, 1));
    }

    #[tokio::test]
    async fn test_bad_request_is_not_recoverable_and_client_released() {
        let connector = ScriptedConnector::new(vec![Reply::Fail(StoreError::BadRequest(
            "error parsing query".into(),
        ))]);
        let store = store_with(Box::new(Flux), &connector);

        let outcome = store.get_downtime(uuid(ASSET), &range(), "C101").await;

        assert_eq!(outcome.result.error_kind, ErrorKind::NotRecoverable);
        assert!(outcome.result.message.contains("error parsing query"));
        assert_eq!((connector.acquired(), connector.released()), (1, 1));
    }

    #[tokio::test]
    async fn test_failed_count_keeps_data_items() {
        let connector = ScriptedConnector::new(vec![
            Reply::Table(table(
                &["", "result", "table", "_time", "AssetID", "C101"],
                &[&[None, Some("_result"), Some("0"), Some("2024-05-01T00:00:00Z"), Some(ASSET), Some("1")]],
            )),
            Reply::Fail(StoreError::TooManyRequests("slow down".into())),
        ]);
        let store = store_with(Box::new(Flux), &connector);

        let request = TimeSeriesRequest {
            asset_ids: vec![uuid(ASSET)],
            customer_id: None,
            channels: ChannelSelection::new(["C101"]),
            range: range(),
            downsample: None,
            page: PageSpec::new(1, 10, 50_000),
        };
        let outcome = store.get_time_series_trend_data(&request).await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.page, None);
        assert_eq!(outcome.result.error_kind, ErrorKind::LikelyRecoverable);

        let queries = connector.queries();
        assert!(queries[0].contains("limit(n: 10, offset: 0)"));
        assert!(queries[1].contains(r#"count(column: "_time")"#));
    }

    #[tokio::test]
    async fn test_downtime_by_param_type_groups_filters() {
        let (store, connector) = influxql(vec![Reply::Table(table(
            &["AssetID", "POCType", "time", "P179"],
            &[&[Some(ASSET), Some("8"), Some("2024-05-01T00:00:00Z"), Some("1")]],
        ))]);
        let filters = [
            DowntimePocFilter {
                poc_type: "8".into(),
                asset_ids: vec![uuid(ASSET)],
                param_standard_types: vec![179],
            },
            DowntimePocFilter {
                poc_type: "17".into(),
                asset_ids: vec![uuid(OTHER)],
                param_standard_types: vec![180],
            },
        ];

        let outcome = store.get_downtime_by_param_standard_type(&filters, &range()).await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.items[0].param_standard_type, Some(179));
        let query = &connector.queries()[0];
        assert!(query.contains(&format!(
            r#"(("POCType" = '8' AND "AssetID" = '{ASSET}') OR ("POCType" = '17' AND "AssetID" = '{OTHER}'))"#
        )));
        assert!(query.contains(r#"GROUP BY "AssetID", "POCType""#));
    }

    #[tokio::test]
    async fn test_current_raw_scan_variants() {
        let scan = || {
            Reply::Table(table(
                &["time", "C101", "C102"],
                &[&[Some("2024-05-01T00:00:00Z"), Some("12"), Some("on")]],
            ))
        };
        let (store, connector) = influxql(vec![scan()]);

        let records = store.get_current_raw_scan_data(uuid(ASSET)).await;
        assert_eq!(records.items.len(), 2);
        assert_eq!(records.items[1].value, "on");
        assert_eq!(connector.released(), 1);

        let connector = ScriptedConnector::new(vec![scan()]);
        let store = store_with(Box::new(InfluxQl), &connector);
        let points = store.get_current_raw_scan_points(uuid(ASSET), uuid(CUSTOMER)).await;
        assert_eq!(points.items.len(), 2);
        assert_eq!(points.items[0].trend_name.as_deref(), Some("C101"));
        assert!(connector.queries()[0].starts_with(r#"SELECT * FROM "AssetData""#));

        assert!(store.get_current_raw_scan_points(uuid(ASSET), Uuid::nil()).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_current_raw_scan_latest_per_dialect() {
        let (store, connector) = influxql(vec![]);
        store.get_current_raw_scan_data(uuid(ASSET)).await;
        assert!(connector.queries()[0].ends_with("ORDER BY time DESC LIMIT 1"));

        // Flux limits each channel series before the pivot
        let connector = ScriptedConnector::new(vec![Reply::Table(table(
            &["_time", "AssetID", "C101", "C102"],
            &[
                &[Some("2024-05-01T00:02:00Z"), Some(ASSET), Some("12"), None],
                &[Some("2024-05-01T00:01:00Z"), Some(ASSET), None, Some("on")],
            ],
        ))]);
        let store = store_with(Box::new(Flux), &connector);
        let records = store.get_current_raw_scan_data(uuid(ASSET)).await;
        let query = &connector.queries()[0];
        assert!(query.find("limit(n: 1)").unwrap() < query.find("pivot(").unwrap());
        assert_eq!(records.items.len(), 2);
    }

    #[tokio::test]
    async fn test_asset_trends_summarises_fetched_points() {
        let (store, connector) = influxql(vec![Reply::Table(table(
            &["time", "C101", "C900"],
            &[
                &[Some("2024-05-01T00:00:00Z"), Some("10"), Some("50")],
                &[Some("2024-05-01T00:05:00Z"), Some("20"), None],
            ],
        ))]);
        let request = AssetTrendsRequest {
            asset_id: uuid(ASSET),
            well_name: "Well 7".into(),
            range: range(),
            poc_type: Some("8".into()),
            parameters: vec![ChannelParameter {
                channel_id: "C101".into(),
                description: "Tubing Pressure".into(),
                unit_of_measure: Some("psi".into()),
            }],
            channels: ChannelSelection::new(["C101"]),
            trend_catalog: vec![TrendCatalogEntry {
                name: "Tubing Pressure".into(),
                display_order: 1,
                min_threshold_channel: None,
                max_threshold_channel: Some("C900".into()),
            }],
            downsample: None,
            tz_offset_hours: 0.0,
            honor_dst: false,
        };

        let outcome = store.get_asset_trends(&request).await;

        assert_eq!(outcome.items.len(), 1);
        let summary = &outcome.items[0];
        assert_eq!((summary.min, summary.max, summary.mean), (Some(10.0), Some(20.0), Some(15.0)));
        assert_eq!(summary.latest, Some(20.0));
        assert_eq!(summary.max_threshold.len(), 1);

        let query = &connector.queries()[0];
        assert!(query.starts_with(r#"SELECT "C101", "C900" FROM"#));
        assert!(query.contains(r#""POCType" = '8'"#));
    }
}
