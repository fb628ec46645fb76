use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::action::Action;
use crate::dispatcher::Dispatcher;
use crate::error::DispatchResult;

/// One performed step of a request: the action, the result it produced, and
/// whether it was executed (undo on rollback) or undone (redo on rollback).
#[derive(Debug, Clone)]
pub(crate) struct ActionResult<A: Action> {
    action: A,
    result: A::Result,
    executed: bool,
}

impl<A: Action> ActionResult<A> {
    pub(crate) fn executed(action: A, result: A::Result) -> Self {
        Self {
            action,
            result,
            executed: true,
        }
    }

    pub(crate) fn undone(action: A, result: A::Result) -> Self {
        Self {
            action,
            result,
            executed: false,
        }
    }
}

/// Type-erased log entry that knows how to compensate itself.
#[async_trait]
pub(crate) trait LoggedAction: Send + Sync {
    fn action_type(&self) -> &'static str;

    fn is_executed(&self) -> bool;

    async fn rollback(&self, ctx: &ExecutionContext) -> DispatchResult<()>;
}

#[async_trait]
impl<A: Action> LoggedAction for ActionResult<A> {
    fn action_type(&self) -> &'static str {
        A::name()
    }

    fn is_executed(&self) -> bool {
        self.executed
    }

    async fn rollback(&self, ctx: &ExecutionContext) -> DispatchResult<()> {
        let dispatcher = ctx.dispatcher();
        if self.executed {
            dispatcher.do_undo(&self.action, &self.result, ctx).await
        } else {
            dispatcher.do_execute(&self.action, ctx).await.map(|_| ())
        }
    }
}

/// Per-request state: the caller's session and the ordered log of what has
/// been performed so far.
///
/// Handlers receive the context by reference and compose further actions
/// through [`ExecutionContext::execute`] and [`ExecutionContext::undo`]; those
/// nested calls land in the same log. The log is append-only and unwound only
/// by the dispatcher.
pub struct ExecutionContext {
    request_id: Uuid,
    session_id: Option<String>,
    dispatcher: Dispatcher,
    log: Mutex<Vec<Box<dyn LoggedAction>>>,
}

impl ExecutionContext {
    pub(crate) fn new(dispatcher: Dispatcher, session_id: Option<String>) -> Self {
        Self::with_request_id(Uuid::new_v4(), dispatcher, session_id)
    }

    fn with_request_id(request_id: Uuid, dispatcher: Dispatcher, session_id: Option<String>) -> Self {
        Self {
            request_id,
            session_id,
            dispatcher,
            log: Mutex::new(Vec::new()),
        }
    }

    /// An empty context for the same request and session. Compensating
    /// actions run against it so they never append to the log being unwound.
    pub(crate) fn fresh(&self) -> Self {
        Self::with_request_id(
            self.request_id,
            self.dispatcher.clone(),
            self.session_id.clone(),
        )
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Execute a nested action as part of this request.
    pub async fn execute<A: Action>(&self, action: A) -> DispatchResult<A::Result> {
        self.dispatcher.do_execute(&action, self).await
    }

    /// Undo a nested action as part of this request.
    pub async fn undo<A: Action>(&self, action: A, result: A::Result) -> DispatchResult<()> {
        self.dispatcher.do_undo(&action, &result, self).await
    }

    /// Number of logged steps.
    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn record<A: Action>(&self, entry: ActionResult<A>) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(entry));
    }

    pub(crate) fn into_log(self) -> Vec<Box<dyn LoggedAction>> {
        self.log.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("request_id", &self.request_id)
            .field("session_id", &self.session_id)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::DefaultHandlerRegistry;
    use crate::validator_registry::InstanceSessionValidatorRegistry;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Tag(&'static str);

    impl Action for Tag {
        type Result = usize;
    }

    fn empty_dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(DefaultHandlerRegistry::new()),
            Arc::new(InstanceSessionValidatorRegistry::new()),
        )
    }

    #[test]
    fn log_preserves_insertion_order() {
        let ctx = ExecutionContext::new(empty_dispatcher(), Some("s1".to_string()));
        ctx.record(ActionResult::executed(Tag("a"), 1));
        ctx.record(ActionResult::undone(Tag("b"), 2));
        ctx.record(ActionResult::executed(Tag("c"), 3));
        assert_eq!(ctx.len(), 3);

        let flags: Vec<bool> = ctx.into_log().iter().map(|e| e.is_executed()).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn fresh_context_keeps_identity_but_not_log() {
        let ctx = ExecutionContext::new(empty_dispatcher(), Some("s1".to_string()));
        ctx.record(ActionResult::executed(Tag("a"), 1));

        let fresh = ctx.fresh();
        assert_eq!(fresh.request_id(), ctx.request_id());
        assert_eq!(fresh.session_id(), Some("s1"));
        assert!(fresh.is_empty());
    }

    #[test]
    fn entries_report_their_action_type() {
        let entry = ActionResult::executed(Tag("a"), 7);
        assert_eq!(LoggedAction::action_type(&entry), "Tag");
        assert_eq!(entry.result, 7);
        assert_eq!(entry.action.0, "a");
        assert!(LoggedAction::is_executed(&entry));

        let undone = ActionResult::undone(Tag("b"), 8);
        assert!(!LoggedAction::is_executed(&undone));
    }
}
