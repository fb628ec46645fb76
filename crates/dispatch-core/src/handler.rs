use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::action::{Action, ActionKey};
use crate::context::ExecutionContext;
use crate::error::DispatchResult;

/// Forward execution and compensation for one action type.
#[async_trait]
pub trait ActionHandler<A: Action>: Send + Sync {
    /// Perform the action. Handlers may compose other actions through `ctx`.
    async fn execute(&self, action: &A, ctx: &ExecutionContext) -> DispatchResult<A::Result>;

    /// Reverse a previous execution that produced `result`.
    async fn undo(&self, action: &A, result: &A::Result, ctx: &ExecutionContext)
        -> DispatchResult<()>;
}

/// A handler with its action type erased. Holds an `Arc<dyn ActionHandler<A>>`.
#[derive(Clone)]
pub struct ErasedHandler {
    key: ActionKey,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ErasedHandler {
    pub fn new<A: Action>(handler: Arc<dyn ActionHandler<A>>) -> Self {
        Self {
            key: ActionKey::of::<A>(),
            inner: Arc::new(handler),
        }
    }

    pub fn key(&self) -> ActionKey {
        self.key
    }

    /// Recover the typed handler. `None` if this handler serves another action type.
    pub fn downcast<A: Action>(&self) -> Option<Arc<dyn ActionHandler<A>>> {
        self.inner
            .downcast_ref::<Arc<dyn ActionHandler<A>>>()
            .cloned()
    }
}

/// Lookup from action type to handler.
pub trait HandlerRegistry: Send + Sync {
    /// Returns `None` for unregistered action types.
    fn find_handler(&self, key: &ActionKey) -> Option<ErasedHandler>;
}

/// In-memory handler registry. Registering a second handler for the same
/// action type replaces the first.
#[derive(Default)]
pub struct DefaultHandlerRegistry {
    handlers: RwLock<HashMap<ActionKey, ErasedHandler>>,
}

impl DefaultHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler<A: Action>(&self, handler: Arc<dyn ActionHandler<A>>) {
        self.insert(ErasedHandler::new(handler));
    }

    pub(crate) fn insert(&self, handler: ErasedHandler) {
        let key = handler.key();
        let previous = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, handler);
        if previous.is_some() {
            tracing::debug!(action = %key, "Replaced registered handler");
        }
    }

    pub fn remove_handler<A: Action>(&self) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ActionKey::of::<A>())
            .is_some()
    }

    pub fn clear_handlers(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HandlerRegistry for DefaultHandlerRegistry {
    fn find_handler(&self, key: &ActionKey) -> Option<ErasedHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}
