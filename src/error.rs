/// Engine error taxonomy
///
/// Every failure the engine surfaces to a caller falls into one of these
/// buckets. Validation and planning errors reject a submission outright and
/// are never retried; a wait timeout only abandons the caller's wait, the
/// underlying run keeps going.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Structurally invalid graph: missing fields, duplicate node ids,
    /// dangling connection endpoints.
    #[error("invalid workflow: {0}")]
    Validation(String),

    /// The graph contains a cycle; `node_id` names a node on it.
    #[error("workflow contains a cycle involving node '{node_id}'")]
    CycleDetected { node_id: String },

    /// The caller's wait expired before the run reached a terminal state.
    #[error("execution '{id}' still running after {waited_ms}ms")]
    WaitTimeout { id: String, waited_ms: u64 },

    #[error("execution '{0}' not found")]
    ExecutionNotFound(String),

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    /// The engine cannot accept or serve the request right now.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// True for submission-time rejections (validation and cycles).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::CycleDetected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = EngineError::CycleDetected {
            node_id: "b".to_string(),
        };
        assert!(err.to_string().contains("'b'"));
        assert!(err.is_validation());

        let err = EngineError::WaitTimeout {
            id: "e1".to_string(),
            waited_ms: 50,
        };
        assert!(err.to_string().contains("50ms"));
        assert!(!err.is_validation());
    }
}
