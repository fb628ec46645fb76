use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::short_type_name;

/// Decides whether a caller session may run an action.
pub trait SessionValidator: Send + Sync {
    fn is_valid(&self, session_id: Option<&str>) -> bool;
}

/// Accepts every session, including anonymous callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSessionValidator;

impl SessionValidator for DefaultSessionValidator {
    fn is_valid(&self, _session_id: Option<&str>) -> bool {
        true
    }
}

type Constructor = fn() -> Arc<dyn SessionValidator>;

fn construct_default<V: SessionValidator + Default + 'static>() -> Arc<dyn SessionValidator> {
    Arc::new(V::default())
}

/// Type token naming a validator implementation, used by lazy registries and
/// factories to create instances on demand.
#[derive(Clone, Copy)]
pub struct ValidatorClass {
    id: TypeId,
    name: &'static str,
    construct: Option<Constructor>,
}

impl ValidatorClass {
    /// A validator that can be built with `Default`.
    pub fn of<V: SessionValidator + Default + 'static>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: short_type_name(type_name::<V>()),
            construct: Some(construct_default::<V>),
        }
    }

    /// A validator with dependencies; a [`ValidatorContainer`] must provide it.
    pub fn injected<V: SessionValidator + 'static>() -> Self {
        Self {
            id: TypeId::of::<V>(),
            name: short_type_name(type_name::<V>()),
            construct: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ValidatorClass {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValidatorClass {}

impl fmt::Debug for ValidatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidatorClass").field(&self.name).finish()
    }
}

/// Instantiation policy for validator classes.
pub trait ValidatorFactory: Send + Sync {
    fn create(&self, class: &ValidatorClass) -> anyhow::Result<Arc<dyn SessionValidator>>;
}

/// Builds validators through their `Default` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValidatorFactory;

impl ValidatorFactory for DefaultValidatorFactory {
    fn create(&self, class: &ValidatorClass) -> anyhow::Result<Arc<dyn SessionValidator>> {
        match class.construct {
            Some(construct) => Ok(construct()),
            None => anyhow::bail!(
                "Validator {} has no default constructor and no provider",
                class.name
            ),
        }
    }
}

type Provider = Arc<dyn Fn() -> anyhow::Result<Arc<dyn SessionValidator>> + Send + Sync>;

/// Holds provider closures per validator type, so validators can be built
/// with their dependencies. Falls back to the default constructor.
#[derive(Default, Clone)]
pub struct ValidatorContainer {
    providers: HashMap<TypeId, Provider>,
}

impl ValidatorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide<V, F>(mut self, provider: F) -> Self
    where
        V: SessionValidator + 'static,
        F: Fn() -> anyhow::Result<V> + Send + Sync + 'static,
    {
        let provider: Provider = Arc::new(move || {
            let validator: Arc<dyn SessionValidator> = Arc::new(provider()?);
            Ok(validator)
        });
        self.providers.insert(TypeId::of::<V>(), provider);
        self
    }

    /// Hand out one shared instance for every request of `V`.
    pub fn provide_instance<V>(mut self, instance: Arc<V>) -> Self
    where
        V: SessionValidator + 'static,
    {
        let provider: Provider = Arc::new(move || {
            let validator: Arc<dyn SessionValidator> = instance.clone();
            Ok(validator)
        });
        self.providers.insert(TypeId::of::<V>(), provider);
        self
    }
}

impl ValidatorFactory for ValidatorContainer {
    fn create(&self, class: &ValidatorClass) -> anyhow::Result<Arc<dyn SessionValidator>> {
        match self.providers.get(&class.id) {
            Some(provider) => provider(),
            None => DefaultValidatorFactory.create(class),
        }
    }
}
