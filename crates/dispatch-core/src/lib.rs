//! Server-side action dispatch: typed actions are executed through registered
//! handlers after a per-action session check, and a failed request is rolled
//! back by compensating every step it already performed, newest first.

pub mod action;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod module;
pub mod validator;
pub mod validator_registry;

pub use action::{Action, ActionKey};
pub use config::{DispatchConfig, RollbackPolicy, UnauthorizedUndo, ValidatorRegistryKind};
pub use context::ExecutionContext;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use event::{ChannelEventSink, DispatchEvent, EventSink, TracingEventSink};
pub use handler::{ActionHandler, DefaultHandlerRegistry, ErasedHandler, HandlerRegistry};
pub use module::{DispatchBinder, DispatchBuilder, DispatchModule};
pub use validator::{
    DefaultSessionValidator, DefaultValidatorFactory, SessionValidator, ValidatorClass,
    ValidatorContainer, ValidatorFactory,
};
pub use validator_registry::{
    InstanceSessionValidatorRegistry, LazySessionValidatorRegistry, SessionValidatorRegistry,
};
