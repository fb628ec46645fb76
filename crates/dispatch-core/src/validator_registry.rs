use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::action::{Action, ActionKey};
use crate::validator::{SessionValidator, ValidatorClass, ValidatorFactory};

/// Lookup from action type to its session validator.
pub trait SessionValidatorRegistry: Send + Sync {
    /// Returns `None` when no validator is registered (or none could be built).
    fn find_validator(&self, key: &ActionKey) -> Option<Arc<dyn SessionValidator>>;

    /// Drop registered validator instances.
    fn clear_validators(&self);
}

/// Registry of pre-built validator instances.
#[derive(Default)]
pub struct InstanceSessionValidatorRegistry {
    validators: RwLock<HashMap<ActionKey, Arc<dyn SessionValidator>>>,
}

impl InstanceSessionValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator<A: Action>(&self, validator: Arc<dyn SessionValidator>) {
        self.insert(ActionKey::of::<A>(), validator);
    }

    pub(crate) fn insert(&self, key: ActionKey, validator: Arc<dyn SessionValidator>) {
        self.validators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, validator);
    }

    pub fn remove_validator<A: Action>(&self) -> bool {
        self.validators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&ActionKey::of::<A>())
            .is_some()
    }
}

impl SessionValidatorRegistry for InstanceSessionValidatorRegistry {
    fn find_validator(&self, key: &ActionKey) -> Option<Arc<dyn SessionValidator>> {
        self.validators
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn clear_validators(&self) {
        self.validators
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Registry of validator classes. An instance is created through the factory
/// the first time its action type is looked up, then cached.
///
/// Cached lookups only take the `instances` read lock. Creation is serialized
/// by `creating`, which is held across check-create-cache so each action type
/// gets at most one instance. A factory must not look up an uncached validator
/// on the registry it is building for.
pub struct LazySessionValidatorRegistry {
    factory: Arc<dyn ValidatorFactory>,
    classes: RwLock<HashMap<ActionKey, ValidatorClass>>,
    instances: RwLock<HashMap<ActionKey, Arc<dyn SessionValidator>>>,
    creating: Mutex<()>,
}

impl LazySessionValidatorRegistry {
    pub fn new(factory: Arc<dyn ValidatorFactory>) -> Self {
        Self {
            factory,
            classes: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            creating: Mutex::new(()),
        }
    }

    pub fn add_validator_class<A: Action>(&self, class: ValidatorClass) {
        self.insert(ActionKey::of::<A>(), class);
    }

    pub(crate) fn insert(&self, key: ActionKey, class: ValidatorClass) {
        // Lock order everywhere: creating, instances, classes.
        let _creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        let previous = classes.insert(key, class);
        if previous.is_some_and(|previous| previous != class) {
            instances.remove(&key);
        }
    }

    /// Removes the binding only if `class` is the one currently registered.
    pub fn remove_validator_class<A: Action>(&self, class: ValidatorClass) -> bool {
        let key = ActionKey::of::<A>();
        let _creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        let mut classes = self.classes.write().unwrap_or_else(PoisonError::into_inner);
        if classes.get(&key) != Some(&class) {
            return false;
        }
        classes.remove(&key);
        instances.remove(&key);
        true
    }

    /// Number of instances created so far.
    pub fn cached(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn cached_validator(&self, key: &ActionKey) -> Option<Arc<dyn SessionValidator>> {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl SessionValidatorRegistry for LazySessionValidatorRegistry {
    fn find_validator(&self, key: &ActionKey) -> Option<Arc<dyn SessionValidator>> {
        if let Some(validator) = self.cached_validator(key) {
            return Some(validator);
        }

        let _creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have created it while we waited.
        if let Some(validator) = self.cached_validator(key) {
            return Some(validator);
        }

        let class = self
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()?;

        match self.factory.create(&class) {
            Ok(validator) => {
                tracing::debug!(action = %key, validator = class.name(), "Created session validator");
                self.instances
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(*key, validator.clone());
                Some(validator)
            }
            Err(e) => {
                tracing::error!(
                    action = %key,
                    validator = class.name(),
                    error = %e,
                    "Failed to create session validator"
                );
                None
            }
        }
    }

    fn clear_validators(&self) {
        let _creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        self.instances
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
