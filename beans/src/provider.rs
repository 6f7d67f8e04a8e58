//! Deferred lookup handles.

use crate::core::{cast_value, TypeKey};
use crate::error::{BeanError, Result};
use crate::registry::{BeanRegistry, DefinitionEntry};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};
use std::vec;

/// A handle that resolves beans of type `T` only when asked.
///
/// Holding a provider does not keep the registry alive. Once the registry is closed or
/// dropped, every call fails with [`BeanError::Closed`]. Because each call performs a
/// fresh lookup, beans registered after the provider was created are visible to it.
pub struct Provider<T: ?Sized> {
  registry: Weak<BeanRegistry>,
  registry_name: String,
  name: Option<String>,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Any + Send + Sync> Provider<T> {
  pub(crate) fn new(
    registry: Weak<BeanRegistry>,
    registry_name: String,
    name: Option<String>,
  ) -> Self {
    Self {
      registry,
      registry_name,
      name,
      _marker: PhantomData,
    }
  }

  fn registry(&self) -> Result<Arc<BeanRegistry>> {
    let registry = self.registry.upgrade().ok_or_else(|| BeanError::Closed {
      registry: self.registry_name.clone(),
    })?;
    registry.ensure_open()?;
    Ok(registry)
  }

  /// The bean name this provider is restricted to, if any.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Resolves the bean now. Same rules as [`BeanRegistry::get_by_type`].
  pub fn get(&self) -> Result<Arc<T>> {
    self.registry()?.get_by_type::<T>(self.name())
  }

  /// Resolves the bean, or `Ok(None)` if there is none. Ambiguity is still an error.
  pub fn get_if_available(&self) -> Result<Option<Arc<T>>> {
    self.registry()?.try_get_by_type::<T>(self.name())
  }

  /// Runs `consumer` with the bean if one is available.
  pub fn if_available<F>(&self, consumer: F) -> Result<()>
  where
    F: FnOnce(Arc<T>),
  {
    if let Some(bean) = self.get_if_available()? {
      consumer(bean);
    }
    Ok(())
  }

  /// Every matching bean in the provider's registry, in registration order.
  ///
  /// Parent registries are not included.
  pub fn stream(&self) -> Result<BeanStream<T>> {
    let registry = self.registry()?;
    let entries = registry.candidates(TypeKey::of::<T>(), self.name());
    Ok(BeanStream::new(self.registry.clone(), self.registry_name.clone(), entries))
  }
}

impl<T: ?Sized> Clone for Provider<T> {
  fn clone(&self) -> Self {
    Self {
      registry: self.registry.clone(),
      registry_name: self.registry_name.clone(),
      name: self.name.clone(),
      _marker: PhantomData,
    }
  }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Provider")
      .field("type", &std::any::type_name::<T>())
      .field("name", &self.name)
      .field("registry", &self.registry_name)
      .finish()
  }
}

impl<'a, T: ?Sized + Any + Send + Sync> IntoIterator for &'a Provider<T> {
  type Item = Result<Arc<T>>;
  type IntoIter = BeanStream<T>;

  /// Iterates like [`Provider::stream`]. A closed registry yields a single `Closed` error.
  fn into_iter(self) -> BeanStream<T> {
    match self.stream() {
      Ok(stream) => stream,
      Err(err) => BeanStream::failed(self.registry_name.clone(), err),
    }
  }
}

/// A lazily instantiating iterator over the beans matching a type.
///
/// The set of candidates is fixed when the stream is created; each bean is created (or
/// fetched from the singleton cache) only when the iterator reaches it.
pub struct BeanStream<T: ?Sized> {
  registry: Weak<BeanRegistry>,
  registry_name: String,
  entries: vec::IntoIter<DefinitionEntry>,
  pending_error: Option<BeanError>,
  _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Any + Send + Sync> BeanStream<T> {
  pub(crate) fn new(
    registry: Weak<BeanRegistry>,
    registry_name: String,
    entries: Vec<DefinitionEntry>,
  ) -> Self {
    Self {
      registry,
      registry_name,
      entries: entries.into_iter(),
      pending_error: None,
      _marker: PhantomData,
    }
  }

  fn failed(registry_name: String, error: BeanError) -> Self {
    Self {
      registry: Weak::new(),
      registry_name,
      entries: Vec::new().into_iter(),
      pending_error: Some(error),
      _marker: PhantomData,
    }
  }

  /// Collects every bean, stopping at the first failure.
  pub fn try_collect(self) -> Result<Vec<Arc<T>>> {
    self.collect()
  }
}

impl<T: ?Sized + Any + Send + Sync> Iterator for BeanStream<T> {
  type Item = Result<Arc<T>>;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(err) = self.pending_error.take() {
      return Some(Err(err));
    }
    let entry = self.entries.next()?;
    let Some(registry) = self.registry.upgrade() else {
      // Nothing more can be produced once the registry is gone.
      self.entries = Vec::new().into_iter();
      return Some(Err(BeanError::Closed {
        registry: self.registry_name.clone(),
      }));
    };
    Some(
      registry
        .obtain(&entry)
        .and_then(|value| {
          cast_value::<T>(&entry.definition.name, &entry.definition.bindings, &value)
        }),
    )
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let pending = usize::from(self.pending_error.is_some());
    let (low, high) = self.entries.size_hint();
    (low + pending, high.map(|h| h + pending))
  }
}

impl<T: ?Sized> fmt::Debug for BeanStream<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BeanStream")
      .field("type", &std::any::type_name::<T>())
      .field("registry", &self.registry_name)
      .field("remaining", &self.entries.len())
      .finish()
  }
}
