// InfluxQL renderer
use super::{Predicate, QueryBuildError, QueryDialect, QuerySpec};
use crate::domain::request::WindowSize;
use chrono::{DateTime, SecondsFormat, Utc};

const INFLUXQL_UNITS: [&str; 7] = ["ns", "ms", "s", "m", "h", "d", "w"];

#[derive(Debug, Clone, Copy, Default)]
pub struct InfluxQl;

impl QueryDialect for InfluxQl {
    fn name(&self) -> &'static str {
        "influxql"
    }

    fn render(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        spec.validate()?;

        // One statement per channel so each channel gets its own newest point
        if spec.latest && spec.fields.len() > 1 {
            let statements: Vec<String> = spec
                .fields
                .iter()
                .map(|field| self.statement(spec, std::slice::from_ref(field), true))
                .collect();
            return Ok(statements.join("; "));
        }

        if let Some(downsample) = &spec.downsample {
            if !self.supports_window(&downsample.window) {
                return Err(QueryBuildError::UnsupportedWindow(downsample.window.as_str().to_string()));
            }
        }

        // LIMIT under a tag GROUP BY is per series; page the merged rows instead
        match &spec.page {
            Some(page) if !spec.latest && !spec.group_by_tags.is_empty() => {
                let grouped = self.statement(spec, &spec.fields, false);
                Ok(format!(
                    "SELECT * FROM ({grouped}) ORDER BY time LIMIT {} OFFSET {}",
                    page.limit, page.offset
                ))
            }
            _ => Ok(self.statement(spec, &spec.fields, true)),
        }
    }

    /// Duration literals take `u`/`µ` for microseconds and have no month or
    /// year unit.
    fn supports_window(&self, window: &WindowSize) -> bool {
        window.units().iter().all(|unit| INFLUXQL_UNITS.contains(unit))
    }

    fn render_count(&self, spec: &QuerySpec) -> Result<String, QueryBuildError> {
        spec.validate()?;
        let inner = self.statement(spec, &spec.fields, false);
        Ok(format!("SELECT count(*) FROM ({inner})"))
    }
}

impl InfluxQl {
    fn statement(&self, spec: &QuerySpec, fields: &[String], with_tail: bool) -> String {
        let mut query = format!(
            "SELECT {} FROM {}",
            select_clause(spec, fields),
            quote_ident(&spec.measurement)
        );

        let mut conditions: Vec<String> = spec.filters.iter().map(render_predicate).collect();
        if let Some(range) = &spec.range {
            conditions.push(format!("time >= {}", time_literal(&range.start)));
            conditions.push(format!("time <= {}", time_literal(&range.end)));
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        let mut grouping = Vec::new();
        if let Some(downsample) = &spec.downsample {
            grouping.push(format!("time({})", downsample.window.as_str()));
        }
        grouping.extend(spec.group_by_tags.iter().map(|t| quote_ident(t)));
        if !grouping.is_empty() {
            query.push_str(" GROUP BY ");
            query.push_str(&grouping.join(", "));
        }
        if spec.downsample.is_some() {
            query.push_str(" fill(none)");
        }

        if with_tail {
            if spec.latest {
                query.push_str(" ORDER BY time DESC LIMIT 1");
            } else if let Some(page) = &spec.page {
                query.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
            }
        }

        query
    }
}

fn select_clause(spec: &QuerySpec, fields: &[String]) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }

    let project = |field: &String| match &spec.downsample {
        Some(downsample) => format!(
            "{}({}) AS {}",
            downsample.aggregate,
            quote_ident(field),
            quote_ident(field)
        ),
        None => quote_ident(field),
    };

    match fields {
        [single] => project(single),
        many => many.iter().map(project).collect::<Vec<_>>().join(", "),
    }
}

fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::TagEquals { tag, values } => match values.as_slice() {
            [single] => format!("{} = {}", quote_ident(tag), quote_literal(single)),
            many => {
                let alternatives: Vec<String> = many
                    .iter()
                    .map(|v| format!("{} = {}", quote_ident(tag), quote_literal(v)))
                    .collect();
                format!("({})", alternatives.join(" OR "))
            }
        },
        Predicate::AnyOf(groups) => {
            let rendered: Vec<String> = groups
                .iter()
                .map(|group| match group.as_slice() {
                    [single] => render_predicate(single),
                    many => format!(
                        "({})",
                        many.iter().map(render_predicate).collect::<Vec<_>>().join(" AND ")
                    ),
                })
                .collect();
            match rendered.as_slice() {
                [single] => single.clone(),
                _ => format!("({})", rendered.join(" OR ")),
            }
        }
    }
}

/// RFC3339 with nanosecond precision, as a single-quoted InfluxQL literal.
fn time_literal(instant: &DateTime<Utc>) -> String {
    format!("'{}'", instant.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
