// Query builder - Dialect-neutral query model and the renderer contract
//
// Facade code describes *what* to fetch as a `QuerySpec`; each dialect turns
// that into query text. Nothing outside this module splices query strings.
pub mod flux;
pub mod influxql;

use crate::domain::request::{DownsampleSpec, OffsetConvention, PageSpec, TimeRange, WindowSize};
use thiserror::Error;

pub use flux::Flux;
pub use influxql::InfluxQl;

pub const ASSET_TAG: &str = "AssetID";
pub const CUSTOMER_TAG: &str = "CustomerID";
pub const POC_TYPE_TAG: &str = "POCType";

#[derive(Debug, Error, PartialEq)]
pub enum QueryBuildError {
    #[error("no channels selected")]
    EmptyChannels,

    #[error("predicate on '{0}' has no values")]
    EmptyPredicate(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("window size '{0}' is not supported by this dialect")]
    UnsupportedWindow(String),
}

/// One WHERE/filter clause. Multi-value predicates render as a parenthesized
/// OR; a single value renders as a bare comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    TagEquals { tag: String, values: Vec<String> },
    /// OR of AND-groups, e.g. `(POCType = 8 AND AssetID = a) OR (...)`.
    AnyOf(Vec<Vec<Predicate>>),
}

impl Predicate {
    pub fn tag<I, S>(tag: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Predicate::TagEquals {
            tag: tag.to_string(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Limit/offset pair appended to a paged data query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub offset: u64,
}

impl Window {
    pub fn for_page(page: &PageSpec, convention: OffsetConvention) -> Option<Self> {
        page.is_paged().then(|| Self {
            limit: u64::from(page.page_size),
            offset: page.offset(convention),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub bucket: String,
    pub measurement: String,
    pub filters: Vec<Predicate>,
    /// Empty means every field.
    pub fields: Vec<String>,
    pub range: Option<TimeRange>,
    pub downsample: Option<DownsampleSpec>,
    pub group_by_tags: Vec<String>,
    /// Newest-first with one point per channel (per series).
    pub latest: bool,
    pub page: Option<Window>,
}

impl QuerySpec {
    pub fn new(bucket: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            measurement: measurement.into(),
            filters: Vec::new(),
            fields: Vec::new(),
            range: None,
            downsample: None,
            group_by_tags: Vec::new(),
            latest: false,
            page: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn downsample(mut self, downsample: Option<DownsampleSpec>) -> Self {
        self.downsample = downsample;
        self
    }

    pub fn group_by<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn latest(mut self) -> Self {
        self.latest = true;
        self
    }

    pub fn page(mut self, page: Option<Window>) -> Self {
        self.page = page;
        self
    }

    /// Check identifiers and predicate arity before any rendering happens.
    pub fn validate(&self) -> Result<(), QueryBuildError> {
        if self.downsample.is_some() && self.fields.is_empty() {
            return Err(QueryBuildError::EmptyChannels);
        }
        for field in &self.fields {
            check_identifier(field)?;
        }
        for tag in &self.group_by_tags {
            check_identifier(tag)?;
        }
        self.filters.iter().try_for_each(validate_predicate)
    }
}

fn validate_predicate(predicate: &Predicate) -> Result<(), QueryBuildError> {
    match predicate {
        Predicate::TagEquals { tag, values } => {
            check_identifier(tag)?;
            if values.is_empty() {
                return Err(QueryBuildError::EmptyPredicate(tag.clone()));
            }
            Ok(())
        }
        Predicate::AnyOf(groups) => {
            if groups.is_empty() || groups.iter().any(Vec::is_empty) {
                return Err(QueryBuildError::EmptyPredicate("group".to_string()));
            }
            groups.iter().flatten().try_for_each(validate_predicate)
        }
    }
}

/// Renders a `QuerySpec` into dialect-specific query text.
pub trait QueryDialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Data query, including the limit/offset stage when `spec.page` is set.
    fn render(&self, spec: &QuerySpec) -> Result<String, QueryBuildError>;

    /// Companion count query: same filters and grouping, no ordering or
    /// paging, collapsed into a `count*` column.
    fn render_count(&self, spec: &QuerySpec) -> Result<String, QueryBuildError>;

    /// Whether every unit of `window` is valid in this dialect's duration
    /// literals.
    fn supports_window(&self, _window: &WindowSize) -> bool {
        true
    }
}

/// Field and tag names: ASCII alphanumerics and underscore only.
pub fn check_identifier(name: &str) -> Result<(), QueryBuildError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(QueryBuildError::InvalidIdentifier(name.to_string()))
    }
}
