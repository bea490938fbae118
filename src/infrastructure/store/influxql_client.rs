// InfluxQL store client - JSON series responses from the /query endpoint
use super::{QueryContext, RawTable, StoreConnector, StoreError, StoreSession};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InfluxQlConnector {
    endpoint: Arc<Endpoint>,
}

#[derive(Debug)]
struct Endpoint {
    host: String,
    token: String,
    database: String,
    retention_policy: String,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResponse {
    #[serde(default)]
    results: Vec<InfluxQLResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLResult {
    #[serde(default)]
    series: Option<Vec<InfluxQLSeries>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxQLSeries {
    #[allow(dead_code)]
    #[serde(default)]
    name: String,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    tags: Option<BTreeMap<String, String>>,
}

impl InfluxQlConnector {
    pub fn new(host: String, token: String, database: String, retention_policy: String) -> Self {
        Self {
            endpoint: Arc::new(Endpoint {
                host: host.trim_end_matches('/').to_string(),
                token,
                database,
                retention_policy,
            }),
        }
    }
}

impl StoreConnector for InfluxQlConnector {
    fn backend(&self) -> &'static str {
        "influxql"
    }

    fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Box::new(InfluxQlSession {
            client,
            endpoint: self.endpoint.clone(),
        }))
    }
}

struct InfluxQlSession {
    client: reqwest::Client,
    endpoint: Arc<Endpoint>,
}

impl InfluxQlSession {
    fn build_query_url(&self, query: &str) -> String {
        let endpoint = &self.endpoint;
        format!(
            "{}/query?db={}&rp={}&q={}",
            endpoint.host,
            urlencoding::encode(&endpoint.database),
            urlencoding::encode(&endpoint.retention_policy),
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl StoreSession for InfluxQlSession {
    async fn execute(&mut self, query: &str, ctx: &QueryContext) -> Result<RawTable, StoreError> {
        let url = self.build_query_url(query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.endpoint.token))
            .header("Accept", "application/json")
            .timeout(ctx.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, body));
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

/// Flatten every statement's series into one table. Series tags become
/// leading columns so grouped rows keep their `AssetID`/`POCType`.
fn parse_response(body: &str) -> Result<RawTable, StoreError> {
    let data: InfluxQLResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;

    if let Some(error) = data.error {
        return Err(StoreError::Backend(error));
    }

    let mut table = RawTable::default();
    for result in data.results {
        if let Some(error) = result.error {
            return Err(StoreError::Backend(error));
        }
        for series in result.series.unwrap_or_default() {
            let tags = series.tags.unwrap_or_default();
            let columns: Vec<String> = tags.keys().cloned().chain(series.columns).collect();
            let rows: Vec<Vec<Option<String>>> = series
                .values
                .into_iter()
                .map(|values| {
                    tags.values()
                        .map(|tag| Some(tag.clone()))
                        .chain(values.into_iter().map(cell_text))
                        .collect()
                })
                .collect();
            table.merge(&columns, rows);
        }
    }

    tracing::debug!(rows = table.rows.len(), "decoded influxql response");
    Ok(table)
}

fn cell_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
