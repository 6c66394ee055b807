use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session config: {0}")]
    Validation(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("session operation failed ({operation}): {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BoxedError,
    },
}

impl SessionError {
    /// Adapter for `map_err` on database calls.
    pub(crate) fn storage(operation: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |err| SessionError::Storage {
            operation,
            source: err.into(),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, SessionError::Storage { .. })
    }
}
