// Error classifier - One place that decides how recoverable a failure is
use crate::domain::outcome::{ErrorKind, QueryResult};
use crate::infrastructure::store::StoreError;

pub fn error_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::Timeout(_) | StoreError::TooManyRequests(_) => ErrorKind::LikelyRecoverable,
        StoreError::InternalServerError(_)
        | StoreError::BadRequest(_)
        | StoreError::Backend(_)
        | StoreError::Transport(_)
        | StoreError::Decode(_)
        | StoreError::Query(_) => ErrorKind::NotRecoverable,
    }
}

pub fn classify(err: &StoreError) -> QueryResult {
    QueryResult::failed(err.to_string(), error_kind(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::query::QueryBuildError;

    #[test]
    fn test_recoverable_kinds() {
        for err in [
            StoreError::Timeout("408".into()),
            StoreError::TooManyRequests("429".into()),
        ] {
            assert_eq!(classify(&err).error_kind, ErrorKind::LikelyRecoverable);
        }
    }

    #[test]
    fn test_not_recoverable_kinds() {
        for err in [
            StoreError::InternalServerError("500".into()),
            StoreError::BadRequest("400".into()),
            StoreError::Backend("field not found".into()),
            StoreError::Transport("connection refused".into()),
            StoreError::Decode("eof".into()),
            StoreError::Query(QueryBuildError::EmptyChannels),
        ] {
            assert_eq!(classify(&err).error_kind, ErrorKind::NotRecoverable);
        }
    }

    #[test]
    fn test_message_carries_detail() {
        let result = classify(&StoreError::BadRequest("400 Bad Request: bad group by".into()));
        assert_eq!(result.message, "bad request: 400 Bad Request: bad group by");
        assert!(!result.is_ok());
    }
}
