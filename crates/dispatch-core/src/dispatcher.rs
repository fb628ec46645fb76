use std::sync::Arc;

use crate::action::{Action, ActionKey};
use crate::config::{DispatchConfig, RollbackPolicy, UnauthorizedUndo};
use crate::context::{ActionResult, ExecutionContext};
use crate::error::{DispatchError, DispatchResult};
use crate::event::{DispatchEvent, EventSink};
use crate::handler::{ActionHandler, HandlerRegistry};
use crate::module::DispatchBuilder;
use crate::validator::SessionValidator;
use crate::validator_registry::SessionValidatorRegistry;

struct Inner {
    handlers: Arc<dyn HandlerRegistry>,
    validators: Arc<dyn SessionValidatorRegistry>,
    config: DispatchConfig,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

/// Executes and undoes actions on behalf of callers.
///
/// Holds no per-request state: every top-level call gets its own
/// [`ExecutionContext`], and a failed call rolls back everything that context
/// logged before the error is returned. Cheap to clone and safe to share.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(
        handlers: Arc<dyn HandlerRegistry>,
        validators: Arc<dyn SessionValidatorRegistry>,
    ) -> Self {
        Self::with_config(handlers, validators, DispatchConfig::default(), Vec::new())
    }

    pub fn with_config(
        handlers: Arc<dyn HandlerRegistry>,
        validators: Arc<dyn SessionValidatorRegistry>,
        config: DispatchConfig,
        event_sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers,
                validators,
                config,
                event_sinks,
            }),
        }
    }

    pub fn builder() -> DispatchBuilder {
        DispatchBuilder::new()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    async fn emit(&self, event: DispatchEvent) {
        for sink in &self.inner.event_sinks {
            sink.emit(event.clone()).await;
        }
    }

    /// Execute `action` for the caller identified by `session_id`.
    pub async fn execute<A: Action>(
        &self,
        session_id: Option<&str>,
        action: A,
    ) -> DispatchResult<A::Result> {
        let ctx = ExecutionContext::new(self.clone(), session_id.map(str::to_owned));
        self.emit(DispatchEvent::Started {
            request_id: ctx.request_id(),
            action_type: A::name(),
            at: chrono::Utc::now(),
        })
        .await;

        let outcome = self.do_execute(&action, &ctx).await;
        match outcome {
            Ok(result) => {
                self.complete(&ctx).await;
                Ok(result)
            }
            Err(e) => Err(self.fail(ctx, e).await),
        }
    }

    pub async fn execute_unauthenticated<A: Action>(&self, action: A) -> DispatchResult<A::Result> {
        self.execute(None, action).await
    }

    /// Undo a previous execution of `action` that produced `result`.
    pub async fn undo<A: Action>(
        &self,
        session_id: Option<&str>,
        action: A,
        result: A::Result,
    ) -> DispatchResult<()> {
        let ctx = ExecutionContext::new(self.clone(), session_id.map(str::to_owned));
        self.emit(DispatchEvent::Started {
            request_id: ctx.request_id(),
            action_type: A::name(),
            at: chrono::Utc::now(),
        })
        .await;

        let outcome = self.do_undo(&action, &result, &ctx).await;
        match outcome {
            Ok(()) => {
                self.complete(&ctx).await;
                Ok(())
            }
            Err(e) => Err(self.fail(ctx, e).await),
        }
    }

    pub async fn undo_unauthenticated<A: Action>(
        &self,
        action: A,
        result: A::Result,
    ) -> DispatchResult<()> {
        self.undo(None, action, result).await
    }

    pub(crate) async fn do_execute<A: Action>(
        &self,
        action: &A,
        ctx: &ExecutionContext,
    ) -> DispatchResult<A::Result> {
        let handler = self.find_handler::<A>()?;
        let validator = self.find_validator::<A>()?;

        if !validator.is_valid(ctx.session_id()) {
            tracing::warn!(
                action = A::name(),
                request_id = %ctx.request_id(),
                "Session not allowed to execute action"
            );
            self.emit(DispatchEvent::Rejected {
                request_id: ctx.request_id(),
                action_type: A::name(),
                undo: false,
            })
            .await;
            return Err(DispatchError::insufficient_rights());
        }

        tracing::debug!(action = A::name(), request_id = %ctx.request_id(), "Executing action");
        let result = handler
            .execute(action, ctx)
            .await
            .map_err(|e| e.into_service(A::name()))?;

        ctx.record(ActionResult::executed(action.clone(), result.clone()));
        self.emit(DispatchEvent::Executed {
            request_id: ctx.request_id(),
            action_type: A::name(),
        })
        .await;
        Ok(result)
    }

    pub(crate) async fn do_undo<A: Action>(
        &self,
        action: &A,
        result: &A::Result,
        ctx: &ExecutionContext,
    ) -> DispatchResult<()> {
        let handler = self.find_handler::<A>()?;
        let validator = self.find_validator::<A>()?;

        if !validator.is_valid(ctx.session_id()) {
            self.emit(DispatchEvent::Rejected {
                request_id: ctx.request_id(),
                action_type: A::name(),
                undo: true,
            })
            .await;
            return match self.config().unauthorized_undo {
                UnauthorizedUndo::Ignore => {
                    tracing::debug!(
                        action = A::name(),
                        request_id = %ctx.request_id(),
                        "Skipping undo for unauthorized session"
                    );
                    Ok(())
                }
                UnauthorizedUndo::Reject => {
                    tracing::warn!(
                        action = A::name(),
                        request_id = %ctx.request_id(),
                        "Session not allowed to undo action"
                    );
                    Err(DispatchError::insufficient_rights())
                }
            };
        }

        tracing::debug!(action = A::name(), request_id = %ctx.request_id(), "Undoing action");
        handler
            .undo(action, result, ctx)
            .await
            .map_err(|e| e.into_service(A::name()))?;

        ctx.record(ActionResult::undone(action.clone(), result.clone()));
        self.emit(DispatchEvent::Undone {
            request_id: ctx.request_id(),
            action_type: A::name(),
        })
        .await;
        Ok(())
    }

    async fn complete(&self, ctx: &ExecutionContext) {
        self.emit(DispatchEvent::Completed {
            request_id: ctx.request_id(),
            at: chrono::Utc::now(),
        })
        .await;
    }

    async fn fail(&self, ctx: ExecutionContext, error: DispatchError) -> DispatchError {
        let request_id = ctx.request_id();
        let error = self.rollback(ctx, error).await;
        self.emit(DispatchEvent::Failed {
            request_id,
            error: error.to_string(),
        })
        .await;
        error
    }

    /// Unwind the context's log in reverse against a fresh context. Returns
    /// `original` if every step compensated, otherwise `RollbackFailed`.
    async fn rollback(&self, ctx: ExecutionContext, original: DispatchError) -> DispatchError {
        let request_id = ctx.request_id();
        let rollback_ctx = ctx.fresh();
        let entries = ctx.into_log();
        if entries.is_empty() {
            return original;
        }

        tracing::warn!(
            request_id = %request_id,
            entries = entries.len(),
            error = %original,
            "Dispatch failed, rolling back"
        );
        self.emit(DispatchEvent::RollbackStarted {
            request_id,
            entries: entries.len(),
        })
        .await;

        let mut failures = 0;
        let mut first_failure = None;
        for entry in entries.iter().rev() {
            let redo = !entry.is_executed();
            let success = match entry.rollback(&rollback_ctx).await {
                Ok(()) => {
                    tracing::debug!(action = entry.action_type(), redo, "Rollback step succeeded");
                    true
                }
                Err(e) => {
                    tracing::error!(
                        action = entry.action_type(),
                        redo,
                        error = %e,
                        "Rollback step failed"
                    );
                    failures += 1;
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                    false
                }
            };

            self.emit(DispatchEvent::RollbackStepCompleted {
                request_id,
                action_type: entry.action_type(),
                redo,
                success,
            })
            .await;

            if !success && self.config().rollback == RollbackPolicy::StopOnFailure {
                break;
            }
        }

        match first_failure {
            None => {
                tracing::info!(request_id = %request_id, "Rollback completed");
                original
            }
            Some(source) => DispatchError::RollbackFailed {
                original: Box::new(original),
                failures,
                source: Box::new(source),
            },
        }
    }

    fn find_handler<A: Action>(&self) -> DispatchResult<Arc<dyn ActionHandler<A>>> {
        self.inner
            .handlers
            .find_handler(&ActionKey::of::<A>())
            .and_then(|handler| handler.downcast::<A>())
            .ok_or(DispatchError::UnsupportedAction {
                action_type: A::name(),
            })
    }

    fn find_validator<A: Action>(&self) -> DispatchResult<Arc<dyn SessionValidator>> {
        self.inner
            .validators
            .find_validator(&ActionKey::of::<A>())
            .ok_or(DispatchError::UnsupportedAction {
                action_type: A::name(),
            })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("event_sinks", &self.inner.event_sinks.len())
            .finish()
    }
}
