//! Model autoloading.
//!
//! Controllers declare the models they need by short name. Before any action
//! code runs, the dispatcher asks the host's [`ModelLoader`] for
//! `<name>_model` and binds the result under `<name>`, in declaration order.
//! A load failure is fatal to the request.

use std::any::Any;

use indexmap::IndexMap;

use crate::error::DispatchError;

/// A loaded model instance. Concrete types are recovered with
/// [`ModelSet::get`].
pub type BoxedModel = Box<dyn Any>;

/// Host-side collaborator that produces model instances by name.
///
/// `model_name` is the full conventional name (e.g. `user_model`); the error
/// string is whatever the host's model layer reports for a missing or broken
/// model.
pub trait ModelLoader {
    fn load(&self, model_name: &str) -> Result<BoxedModel, String>;
}

/// Loaded models bound under their short names, in declaration order.
#[derive(Default)]
pub struct ModelSet {
    models: IndexMap<String, BoxedModel>,
}

impl std::fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSet")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelSet {
    /// Load every declared model through `loader` and bind it under its
    /// short name. The first failure propagates; nothing is retried.
    pub fn autoload(loader: &dyn ModelLoader, names: &[&str]) -> Result<Self, DispatchError> {
        let mut set = Self::default();
        for name in names {
            let model_name = format!("{name}_model");
            let model = loader
                .load(&model_name)
                .map_err(|message| DispatchError::ModelLoad {
                    model: model_name,
                    message,
                })?;
            set.models.insert((*name).to_string(), model);
        }
        Ok(set)
    }

    /// Fetch a bound model by short name, downcast to its concrete type.
    /// Returns `None` if the name is unbound or the type does not match.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.models.get(name).and_then(|m| m.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Bound short names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
