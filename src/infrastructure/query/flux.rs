// Flux renderer
use super::{Predicate, QueryBuildError, QueryDialect, QuerySpec};
use chrono::{DateTime, SecondsFormat, Utc};

const PIPE: &str = "\n  |> ";

#[derive(Debug, Clone, Copy, Default)]
pub struct Flux;

impl QueryDialect for Flux {
    fn name(&self) -> &'static str {
        "flux"
    }

    fn render(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        spec.validate()?;
        let mut stages = self.pipeline(spec);

        stages.push(if spec.latest {
            r#"sort(columns: ["_time"], desc: true)"#.to_string()
        } else {
            r#"sort(columns: ["_time"])"#.to_string()
        });
        if let Some(page) = &spec.page {
            if !spec.latest {
                stages.push(format!("limit(n: {}, offset: {})", page.limit, page.offset));
            }
        }

        Ok(self.assemble(spec, stages))
    }

    fn render_count(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        spec.validate()?;
        let mut stages = self.pipeline(spec);
        stages.push(r#"count(column: "_time")"#.to_string());
        stages.push(r#"rename(columns: {_time: "count"})"#.to_string());
        Ok(self.assemble(spec, stages))
    }
}

impl Flux {
    /// Stages shared by the data and count queries, up to the ungrouped pivot.
    fn pipeline(&self, spec: &QuerySpec) -> Vec<String> {
        let mut stages = Vec::new();

        stages.push(match &spec.range {
            Some(range) => format!(
                "range(start: {}, stop: {})",
                time_token(&range.start),
                time_token(&range.end)
            ),
            None => "range(start: 0)".to_string(),
        });
        stages.push(format!(
            "filter(fn: (r) => r._measurement == {})",
            quote_string(&spec.measurement)
        ));
        for predicate in &spec.filters {
            stages.push(format!("filter(fn: (r) => {})", render_predicate(predicate)));
        }
        if !spec.fields.is_empty() {
            stages.push(format!("filter(fn: (r) => {})", field_filter(&spec.fields)));
        }

        if spec.latest {
            // Per series, i.e. per asset and channel, before the pivot merges them
            stages.push(r#"sort(columns: ["_time"], desc: true)"#.to_string());
            stages.push("limit(n: 1)".to_string());
        }
        if let Some(downsample) = &spec.downsample {
            stages.push(format!(
                "aggregateWindow(every: {}, fn: {}, createEmpty: false)",
                downsample.window.as_str(),
                downsample.aggregate
            ));
        }

        stages.push(r#"pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")"#.to_string());
        stages.push("group()".to_string());
        stages
    }

    fn assemble(&self, spec: &QuerySpec, stages: Vec<String>) -> String {
        let mut query = format!("from(bucket: {})", quote_string(&spec.bucket));
        for stage in stages {
            query.push_str(PIPE);
            query.push_str(&stage);
        }
        query
    }
}

fn field_filter(fields: &[String]) -> String {
    match fields {
        [single] => format!("r._field == {}", quote_string(single)),
        many => {
            let alternatives: Vec<String> = many
                .iter()
                .map(|f| format!("r._field == {}", quote_string(f)))
                .collect();
            format!("({})", alternatives.join(" or "))
        }
    }
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::TagEquals { tag, values } => match values.as_slice() {
            [single] => format!("r.{tag} == {}", quote_string(single)),
            many => {
                let alternatives: Vec<String> = many
                    .iter()
                    .map(|v| format!("r.{tag} == {}", quote_string(v)))
                    .collect();
                format!("({})", alternatives.join(" or "))
            }
        },
        Predicate::AnyOf(groups) => {
            let rendered: Vec<String> = groups
                .iter()
                .map(|group| match group.as_slice() {
                    [single] => render_predicate(single),
                    many => format!(
                        "({})",
                        many.iter().map(render_predicate).collect::<Vec<_>>().join(" and ")
                    ),
                })
                .collect();
            match rendered.as_slice() {
                [single] => single.clone(),
                _ => format!("({})", rendered.join(" or ")),
            }
        }
    }
}

/// Bare RFC3339 token for `range()`; fractional seconds only when present.
fn time_token(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn quote_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{escaped}\"")
}
