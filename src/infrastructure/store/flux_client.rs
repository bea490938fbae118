// Flux store client - CSV responses from the /api/v2/query endpoint
use super::{QueryContext, RawTable, StoreConnector, StoreError, StoreSession};
use async_trait::async_trait;
use influxdb2::models::Query;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct FluxConnector {
    endpoint: Arc<Endpoint>,
}

#[derive(Debug)]
struct Endpoint {
    host: String,
    token: String,
    org: String,
}

impl FluxConnector {
    pub fn new(host: String, token: String, org: String) -> Self {
        Self {
            endpoint: Arc::new(Endpoint {
                host: host.trim_end_matches('/').to_string(),
                token,
                org,
            }),
        }
    }
}

impl StoreConnector for FluxConnector {
    fn backend(&self) -> &'static str {
        "flux"
    }

    fn connect(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Box::new(FluxSession {
            client,
            endpoint: self.endpoint.clone(),
        }))
    }
}

struct FluxSession {
    client: reqwest::Client,
    endpoint: Arc<Endpoint>,
}

#[async_trait]
impl StoreSession for FluxSession {
    async fn execute(&mut self, query: &str, ctx: &QueryContext) -> Result<RawTable, StoreError> {
        let url = format!(
            "{}/api/v2/query?org={}",
            self.endpoint.host,
            urlencoding::encode(&self.endpoint.org)
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.endpoint.token))
            .header("Accept", "application/csv")
            .json(&Query::new(query.to_string()))
            .timeout(ctx.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, body));
        }

        let body = response.text().await?;
        parse_csv(&body)
    }
}

/// Parse a (possibly annotated) Flux CSV response. Each table block starts
/// with its own header row; blocks with differing schemas are merged.
/// An `error,reference` block is reported as a backend error.
fn parse_csv(body: &str) -> Result<RawTable, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut table = RawTable::default();
    let mut header: Option<Vec<String>> = None;
    let mut block: Vec<Vec<Option<String>>> = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| StoreError::Decode(e.to_string()))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            flush(&mut table, header.take(), &mut block);
            continue;
        }

        let fields: Vec<&str> = record.iter().collect();
        if is_header(&fields) {
            flush(&mut table, header.take(), &mut block);
            header = Some(fields.iter().map(|f| f.to_string()).collect());
            continue;
        }

        let Some(columns) = &header else {
            return Err(StoreError::Decode("data row before header row".to_string()));
        };
        if let Some(error_at) = columns.iter().position(|c| c == "error") {
            let message = fields.get(error_at).copied().unwrap_or_default();
            return Err(StoreError::Backend(message.to_string()));
        }
        block.push(
            fields
                .iter()
                .map(|f| (!f.is_empty()).then(|| f.to_string()))
                .collect(),
        );
    }
    flush(&mut table, header, &mut block);

    tracing::debug!(rows = table.rows.len(), "decoded flux response");
    Ok(table)
}

fn is_header(fields: &[&str]) -> bool {
    let has = |name: &str| fields.contains(&name);
    (has("result") && has("table")) || (has("error") && has("reference"))
}

fn flush(table: &mut RawTable, header: Option<Vec<String>>, block: &mut Vec<Vec<Option<String>>>) {
    if let Some(columns) = header {
        table.merge(&columns, std::mem::take(block));
    }
    block.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_multi_table_csv() {
        let body = "\
,result,table,_start,_stop,_time,AssetID,POCType,C1,C2\r
,_result,0,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T00:00:00Z,a1,8,1.5,\r
,_result,0,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T00:05:00Z,a1,8,2,3\r
\r
,result,table,_start,_stop,_time,AssetID,POCType,C3\r
,_result,1,2024-05-01T00:00:00Z,2024-05-02T00:00:00Z,2024-05-01T00:10:00Z,a2,17,7\r
\r
";
        let table = parse_csv(body).unwrap();
        assert_eq!(
            table.columns,
            ["", "result", "table", "_start", "_stop", "_time", "AssetID", "POCType", "C1", "C2", "C3"]
        );
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0][9], None);
        assert_eq!(table.rows[1][9].as_deref(), Some("3"));
        assert_eq!(table.rows[2][8], None);
        assert_eq!(table.rows[2][10].as_deref(), Some("7"));
    }

    #[test]
    fn test_parse_annotated_csv_skips_annotations() {
        let body = "\
#datatype,string,long,dateTime:RFC3339,long\n\
#group,false,false,false,false\n\
#default,_result,,,\n\
,result,table,_time,count\n\
,,0,2024-05-01T00:00:00Z,42\n";
        let table = parse_csv(body).unwrap();
        assert_eq!(table.columns, ["", "result", "table", "_time", "count"]);
        assert_eq!(table.rows[0][4].as_deref(), Some("42"));
    }

    #[test]
    fn test_parse_error_table() {
        let body = ",error,reference\n,\"unsupported aggregate: stddev\",897\n";
        assert!(matches!(
            parse_csv(body),
            Err(StoreError::Backend(msg)) if msg == "unsupported aggregate: stddev"
        ));
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_csv("").unwrap().is_empty());
        assert!(parse_csv("\r\n").unwrap().is_empty());
    }
}
