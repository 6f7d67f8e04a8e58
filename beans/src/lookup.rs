//! Lookup by name and by type, with parent fallback and primary-bean tie breaking.

use crate::core::{cast_value, BeanValue, TypeKey};
use crate::definition::{BeanDefinition, DependencyRef, RefTarget};
use crate::error::{BeanError, Lookup, Result};
use crate::provider::{BeanStream, Provider};
use crate::registry::{BeanRegistry, DefinitionEntry};
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// A bean value together with the definition it came from.
#[derive(Clone)]
pub(crate) struct ResolvedBean {
  pub(crate) definition: Arc<BeanDefinition>,
  pub(crate) value: BeanValue,
}

impl ResolvedBean {
  pub(crate) fn cast<X: ?Sized + Any + Send + Sync>(&self) -> Result<Arc<X>> {
    cast_value::<X>(&self.definition.name, &self.definition.bindings, &self.value)
  }
}

// --- PUBLIC API ---

impl BeanRegistry {
  /// Looks up the bean registered under `name` and returns it as `T`.
  ///
  /// Searches this registry first, then each ancestor. Fails with
  /// [`BeanError::TypeMismatch`] if the bean cannot be viewed as `T`.
  pub fn get_by_name<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.resolve_name(name)?.cast::<T>()
  }

  /// Looks up the bean that can be viewed as `T`.
  ///
  /// With `name`, only a bean of that name qualifies. Without it, a single candidate wins
  /// outright and several candidates need exactly one primary among them.
  pub fn get_by_type<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>> {
    self.resolve_type(TypeKey::of::<T>(), name)?.cast::<T>()
  }

  /// Like [`get_by_type`](Self::get_by_type), but a missing bean yields `Ok(None)`.
  /// Ambiguity and creation failures are still errors.
  pub fn try_get_by_type<T: ?Sized + Any + Send + Sync>(
    &self,
    name: Option<&str>,
  ) -> Result<Option<Arc<T>>> {
    match self.get_by_type::<T>(name) {
      Ok(bean) => Ok(Some(bean)),
      Err(err) if err.is_not_found() => Ok(None),
      Err(err) => Err(err),
    }
  }

  /// Returns the bean of type `T`, or whatever `default` supplies if there is none.
  pub fn get_if_available<T, F>(&self, default: F) -> Result<Arc<T>>
  where
    T: ?Sized + Any + Send + Sync,
    F: FnOnce() -> Arc<T>,
  {
    Ok(self.try_get_by_type::<T>(None)?.unwrap_or_else(default))
  }

  /// A deferred handle for beans of type `T`. Nothing is resolved until it is used.
  pub fn get_provider<T: ?Sized + Any + Send + Sync>(&self) -> Provider<T> {
    Provider::new(self.downgrade(), self.name().to_owned(), None)
  }

  /// A deferred handle for the bean `name` of type `T`.
  pub fn get_provider_named<T: ?Sized + Any + Send + Sync>(
    &self,
    name: impl Into<String>,
  ) -> Provider<T> {
    Provider::new(self.downgrade(), self.name().to_owned(), Some(name.into()))
  }

  /// Every local bean that can be viewed as `T`, in registration order, instantiated as
  /// the stream is consumed.
  pub fn stream_all<T: ?Sized + Any + Send + Sync>(&self) -> BeanStream<T> {
    let candidates = self.candidates(TypeKey::of::<T>(), None);
    BeanStream::new(self.downgrade(), self.name().to_owned(), candidates)
  }
}

// --- Resolution internals ---

impl BeanRegistry {
  pub(crate) fn resolve_name(&self, name: &str) -> Result<ResolvedBean> {
    if let Some(entry) = self.entry(name) {
      return self.realize(&entry);
    }
    match self.parent() {
      Some(parent) => {
        trace!(
          registry = %self.name(),
          bean = %name,
          parent = %parent.name(),
          "delegating name lookup to parent"
        );
        parent.resolve_name(name)
      }
      None => Err(BeanError::NotFound(Lookup::Name(name.to_owned()))),
    }
  }

  pub(crate) fn resolve_type(&self, key: TypeKey, name: Option<&str>) -> Result<ResolvedBean> {
    let candidates = self.candidates(key, name);
    let chosen = match candidates.len() {
      0 => {
        return match self.parent() {
          Some(parent) => {
            trace!(
              registry = %self.name(),
              r#type = key.type_name,
              parent = %parent.name(),
              "delegating type lookup to parent"
            );
            parent.resolve_type(key, name)
          }
          None => Err(BeanError::NotFound(Lookup::Type {
            type_name: key.type_name,
            name: name.map(str::to_owned),
          })),
        };
      }
      1 => &candidates[0],
      _ => {
        let mut primaries = candidates.iter().filter(|entry| entry.definition.primary);
        match (primaries.next(), primaries.next()) {
          (Some(primary), None) => primary,
          _ => {
            return Err(BeanError::AmbiguousBean {
              type_name: key.type_name,
              candidates: candidates
                .iter()
                .map(|entry| entry.definition.name.clone())
                .collect(),
            })
          }
        }
      }
    };
    self.realize(chosen)
  }

  /// Local definitions exposing `key`, optionally restricted to `name`, in registration order.
  pub(crate) fn candidates(&self, key: TypeKey, name: Option<&str>) -> Vec<DefinitionEntry> {
    match name {
      Some(name) => self
        .entry(name)
        .filter(|entry| entry.definition.exposes(key.type_id))
        .into_iter()
        .collect(),
      None => self
        .entries_in_order()
        .into_iter()
        .filter(|entry| entry.definition.exposes(key.type_id))
        .collect(),
    }
  }

  pub(crate) fn resolve_dependency(&self, reference: &DependencyRef) -> Result<ResolvedBean> {
    match &reference.target {
      RefTarget::Name(name) => self.resolve_name(name),
      RefTarget::Type { key, name } => self.resolve_type(*key, name.as_deref()),
    }
  }

  pub(crate) fn realize(&self, entry: &DefinitionEntry) -> Result<ResolvedBean> {
    Ok(ResolvedBean {
      definition: entry.definition.clone(),
      value: self.obtain(entry)?,
    })
  }
}
