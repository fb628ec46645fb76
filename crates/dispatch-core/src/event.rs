use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Started {
        request_id: Uuid,
        action_type: &'static str,
        at: DateTime<Utc>,
    },
    Executed {
        request_id: Uuid,
        action_type: &'static str,
    },
    Undone {
        request_id: Uuid,
        action_type: &'static str,
    },
    /// The session validator refused the caller.
    Rejected {
        request_id: Uuid,
        action_type: &'static str,
        undo: bool,
    },
    RollbackStarted {
        request_id: Uuid,
        entries: usize,
    },
    RollbackStepCompleted {
        request_id: Uuid,
        action_type: &'static str,
        redo: bool,
        success: bool,
    },
    Completed {
        request_id: Uuid,
        at: DateTime<Utc>,
    },
    Failed {
        request_id: Uuid,
        error: String,
    },
}

impl DispatchEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            Self::Started { request_id, .. }
            | Self::Executed { request_id, .. }
            | Self::Undone { request_id, .. }
            | Self::Rejected { request_id, .. }
            | Self::RollbackStarted { request_id, .. }
            | Self::RollbackStepCompleted { request_id, .. }
            | Self::Completed { request_id, .. }
            | Self::Failed { request_id, .. } => *request_id,
        }
    }

    /// Stable snake_case label of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Executed { .. } => "executed",
            Self::Undone { .. } => "undone",
            Self::Rejected { .. } => "rejected",
            Self::RollbackStarted { .. } => "rollback_started",
            Self::RollbackStepCompleted { .. } => "rollback_step_completed",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// The action the event is about, if it concerns a single action.
    pub fn action_type(&self) -> Option<&'static str> {
        match self {
            Self::Started { action_type, .. }
            | Self::Executed { action_type, .. }
            | Self::Undone { action_type, .. }
            | Self::Rejected { action_type, .. }
            | Self::RollbackStepCompleted { action_type, .. } => Some(*action_type),
            Self::RollbackStarted { .. } | Self::Completed { .. } | Self::Failed { .. } => None,
        }
    }
}

/// Sink for dispatch events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DispatchEvent);
}

/// Forwards events to an unbounded receiver. Once the receiver is dropped,
/// events are discarded.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<DispatchEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn emit(&self, event: DispatchEvent) {
        if let Err(dropped) = self.tx.send(event) {
            tracing::debug!(
                request_id = %dropped.0.request_id(),
                event = dropped.0.kind(),
                "Event receiver closed, discarding event"
            );
        }
    }
}

/// Writes events to `tracing`. Rejections and failures are warnings.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: DispatchEvent) {
        let request_id = event.request_id();
        let action = event.action_type().unwrap_or("-");
        match &event {
            DispatchEvent::Rejected { undo, .. } => {
                tracing::warn!(%request_id, action, undo = *undo, "Session rejected");
            }
            DispatchEvent::Failed { error, .. } => {
                tracing::warn!(%request_id, error = %error, "Request failed");
            }
            DispatchEvent::RollbackStepCompleted { redo, success, .. } => {
                tracing::info!(
                    %request_id,
                    action,
                    redo = *redo,
                    success = *success,
                    "Rollback step completed"
                );
            }
            _ => {
                tracing::debug!(%request_id, event = event.kind(), action, "Dispatch event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelEventSink::new();
        let request_id = Uuid::new_v4();

        sink.emit(DispatchEvent::RollbackStarted {
            request_id,
            entries: 2,
        })
        .await;
        sink.emit(DispatchEvent::Failed {
            request_id,
            error: "Insufficient rights".to_string(),
        })
        .await;

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, DispatchEvent::RollbackStarted { entries: 2, .. }));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.request_id(), request_id);
        assert!(matches!(second, DispatchEvent::Failed { .. }));
    }

    #[test]
    fn events_describe_their_action() {
        let request_id = Uuid::new_v4();
        let rejected = DispatchEvent::Rejected {
            request_id,
            action_type: "DeleteWidget",
            undo: true,
        };
        assert_eq!(rejected.kind(), "rejected");
        assert_eq!(rejected.action_type(), Some("DeleteWidget"));

        let started = DispatchEvent::RollbackStarted {
            request_id,
            entries: 3,
        };
        assert_eq!(started.kind(), "rollback_started");
        assert_eq!(started.action_type(), None);
    }

    #[tokio::test]
    async fn tracing_sink_accepts_every_kind() {
        let request_id = Uuid::new_v4();
        for event in [
            DispatchEvent::Rejected {
                request_id,
                action_type: "DeleteWidget",
                undo: false,
            },
            DispatchEvent::RollbackStepCompleted {
                request_id,
                action_type: "CreateWidget",
                redo: false,
                success: true,
            },
            DispatchEvent::Failed {
                request_id,
                error: "boom".to_string(),
            },
            DispatchEvent::Completed {
                request_id,
                at: Utc::now(),
            },
        ] {
            TracingEventSink.emit(event).await;
        }
    }

    #[tokio::test]
    async fn channel_sink_ignores_dropped_receiver() {
        let (sink, rx) = ChannelEventSink::new();
        drop(rx);
        sink.emit(DispatchEvent::Completed {
            request_id: Uuid::new_v4(),
            at: Utc::now(),
        })
        .await;
    }
}
