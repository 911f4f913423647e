/// Execution lifecycle notifications
///
/// Observers register explicitly (no process-wide event emitter): anything
/// that wants lifecycle events subscribes and receives them over an unbounded
/// channel. Per execution the contract is: `Started` exactly once before any
/// node dispatch, then exactly one of `Completed` / `Failed` at the terminal
/// state — including after exhausted retries.

use tokio::sync::mpsc;
use tokio::sync::RwLock;

use crate::runtime::execution::Execution;

/// A lifecycle notification for one execution.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Started { id: String, graph_id: String },
    Completed { execution: Execution },
    Failed { execution: Execution },
}

/// Fan-out hub for lifecycle events.
///
/// Closed receivers are pruned lazily on the next emit, so a departed
/// observer never wedges the engine.
#[derive(Default)]
pub struct ExecutionEvents {
    listeners: RwLock<Vec<mpsc::UnboundedSender<ExecutionEvent>>>,
}

impl ExecutionEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer and get its event stream.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.write().await.push(tx);
        rx
    }

    /// Deliver an event to every live observer.
    pub async fn emit(&self, event: ExecutionEvent) {
        let mut listeners = self.listeners.write().await;
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::execution::ExecutionOptions;
    use serde_json::Value;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let events = ExecutionEvents::new();
        let mut rx = events.subscribe().await;

        events
            .emit(ExecutionEvent::Started {
                id: "e1".into(),
                graph_id: "wf".into(),
            })
            .await;

        match rx.recv().await.unwrap() {
            ExecutionEvent::Started { id, graph_id } => {
                assert_eq!(id, "e1");
                assert_eq!(graph_id, "wf");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let events = ExecutionEvents::new();
        let rx = events.subscribe().await;
        drop(rx);

        let execution = Execution::new("wf", Value::Null, ExecutionOptions::default());
        events.emit(ExecutionEvent::Completed { execution }).await;
        assert!(events.listeners.read().await.is_empty());
    }
}
