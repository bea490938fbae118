// Per-call outcome: items plus the classified error, if any
use serde::Serialize;

/// Recoverability of a failed call. Retry policy belongs to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    #[default]
    None,
    LikelyRecoverable,
    NotRecoverable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub message: String,
    pub error_kind: ErrorKind,
}

impl QueryResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(message: impl Into<String>, error_kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            error_kind,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_kind == ErrorKind::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_count: u64,
    pub total_pages: u64,
}

/// What every facade call returns. Failures never discard `items`: whatever
/// was mapped before the failure (often nothing) is still handed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome<T> {
    pub items: T,
    pub result: QueryResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,
}

impl<T> QueryOutcome<T> {
    pub fn ok(items: T) -> Self {
        Self {
            items,
            result: QueryResult::ok(),
            page: None,
        }
    }

    pub fn failed(items: T, result: QueryResult) -> Self {
        Self {
            items,
            result,
            page: None,
        }
    }

    pub fn with_page(mut self, page: Option<PageInfo>) -> Self {
        self.page = page;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryOutcome<U> {
        QueryOutcome {
            items: f(self.items),
            result: self.result,
            page: self.page,
        }
    }
}

impl<T: Default> QueryOutcome<T> {
    /// Short-circuit result for calls whose required inputs are missing.
    pub fn empty() -> Self {
        Self::ok(T::default())
    }
}
