use std::sync::Arc;

use crate::action::{Action, ActionKey};
use crate::config::{DispatchConfig, ValidatorRegistryKind};
use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, DispatchResult};
use crate::event::EventSink;
use crate::handler::{ActionHandler, DefaultHandlerRegistry, ErasedHandler};
use crate::validator::{
    DefaultSessionValidator, DefaultValidatorFactory, ValidatorClass, ValidatorFactory,
};
use crate::validator_registry::{
    InstanceSessionValidatorRegistry, LazySessionValidatorRegistry, SessionValidatorRegistry,
};

/// A unit of dispatch configuration: binds action types to handlers and
/// validators.
pub trait DispatchModule {
    fn configure(&self, binder: &mut DispatchBinder);
}

/// Collects bindings from modules.
#[derive(Default)]
pub struct DispatchBinder {
    handlers: Vec<ErasedHandler>,
    validators: Vec<(ActionKey, ValidatorClass)>,
}

impl DispatchBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler that any session, including anonymous ones, may use.
    pub fn bind_handler<A, H>(&mut self, handler: H) -> &mut Self
    where
        A: Action,
        H: ActionHandler<A> + 'static,
    {
        self.bind_secure_handler::<A, H>(handler, ValidatorClass::of::<DefaultSessionValidator>())
    }

    /// Bind a handler guarded by `validator`.
    pub fn bind_secure_handler<A, H>(&mut self, handler: H, validator: ValidatorClass) -> &mut Self
    where
        A: Action,
        H: ActionHandler<A> + 'static,
    {
        let handler: Arc<dyn ActionHandler<A>> = Arc::new(handler);
        self.handlers.push(ErasedHandler::new(handler));
        self.validators.push((ActionKey::of::<A>(), validator));
        self
    }

    pub fn install(&mut self, module: &dyn DispatchModule) -> &mut Self {
        module.configure(self);
        self
    }

    fn link_handlers(&self) -> DefaultHandlerRegistry {
        let registry = DefaultHandlerRegistry::new();
        for handler in &self.handlers {
            registry.insert(handler.clone());
        }
        registry
    }

    /// Later bindings for the same action type replace earlier ones.
    fn link_validators(
        &self,
        kind: ValidatorRegistryKind,
        factory: Arc<dyn ValidatorFactory>,
    ) -> DispatchResult<Arc<dyn SessionValidatorRegistry>> {
        match kind {
            ValidatorRegistryKind::Lazy => {
                let registry = LazySessionValidatorRegistry::new(factory);
                for (key, class) in &self.validators {
                    registry.insert(*key, *class);
                }
                Ok(Arc::new(registry))
            }
            ValidatorRegistryKind::Instance => {
                let registry = InstanceSessionValidatorRegistry::new();
                for (key, class) in &self.validators {
                    let validator = factory.create(class).map_err(|e| {
                        DispatchError::Config(format!(
                            "Cannot create validator {} for action {key}: {e}",
                            class.name()
                        ))
                    })?;
                    registry.insert(*key, validator);
                }
                Ok(Arc::new(registry))
            }
        }
    }
}

/// Assembles a [`Dispatcher`] from modules, a validator factory and event sinks.
pub struct DispatchBuilder {
    binder: DispatchBinder,
    config: DispatchConfig,
    factory: Arc<dyn ValidatorFactory>,
    event_sinks: Vec<Arc<dyn EventSink>>,
}

impl DispatchBuilder {
    pub fn new() -> Self {
        Self {
            binder: DispatchBinder::new(),
            config: DispatchConfig::default(),
            factory: Arc::new(DefaultValidatorFactory),
            event_sinks: Vec::new(),
        }
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn validator_factory(mut self, factory: Arc<dyn ValidatorFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn install(mut self, module: &dyn DispatchModule) -> Self {
        self.binder.install(module);
        self
    }

    /// Direct access to bindings, for setups that don't warrant a module.
    pub fn bind(mut self, configure: impl FnOnce(&mut DispatchBinder)) -> Self {
        configure(&mut self.binder);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sinks.push(sink);
        self
    }

    pub fn build(self) -> DispatchResult<Dispatcher> {
        let handlers = self.binder.link_handlers();
        let validators = self
            .binder
            .link_validators(self.config.validator_registry, self.factory)?;

        tracing::debug!(
            handlers = handlers.len(),
            validator_registry = ?self.config.validator_registry,
            "Built dispatcher"
        );
        Ok(Dispatcher::with_config(
            Arc::new(handlers),
            validators,
            self.config,
            self.event_sinks,
        ))
    }
}

impl Default for DispatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}
