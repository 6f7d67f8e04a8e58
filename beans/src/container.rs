//! The main `Container` struct and its associated methods.

use crate::builder::ContainerBuilder;
use crate::definition::{BeanDefinition, Scope};
use crate::error::{BeanError, Result};
use crate::lifecycle::LifecycleState;
use crate::provider::{BeanStream, Provider};
use crate::registry::BeanRegistry;
use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

const CREATED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

fn state_name(state: u8) -> &'static str {
  match state {
    CREATED => "created",
    RUNNING => "running",
    _ => "stopped",
  }
}

/// The dependency injection container.
///
/// A `Container` owns one [`BeanRegistry`] and drives its lifecycle: definitions are
/// registered, [`start`](Self::start) eagerly builds every non-lazy singleton, lookups are
/// served, and [`stop`](Self::stop) destroys the singletons in reverse creation order.
///
/// All methods take `&self`; a container can be shared across threads behind an `Arc`.
pub struct Container {
  registry: Arc<BeanRegistry>,
  lazy_by_default: bool,
  destroy_on_drop: bool,
  state: AtomicU8,
}

impl Default for Container {
  fn default() -> Self {
    Self::from_parts(BeanRegistry::unnamed(), false, true)
  }
}

impl Container {
  /// Creates a new, empty `Container` with default settings.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates an empty container whose registry is called `name`.
  pub fn named(name: impl Into<String>) -> Self {
    Self::from_parts(BeanRegistry::new(name), false, true)
  }

  /// Starts configuring a container.
  pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
  }

  pub(crate) fn from_parts(
    registry: Arc<BeanRegistry>,
    lazy_by_default: bool,
    destroy_on_drop: bool,
  ) -> Self {
    Self {
      registry,
      lazy_by_default,
      destroy_on_drop,
      state: AtomicU8::new(CREATED),
    }
  }

  // --- PRIVATE HELPERS ---

  fn is_lazy(&self, definition: &BeanDefinition) -> bool {
    definition.lazy.unwrap_or(self.lazy_by_default)
  }

  fn invalid_state(&self, expected: &'static str, actual: u8) -> BeanError {
    BeanError::InvalidState {
      container: self.registry.name().to_owned(),
      expected,
      actual: state_name(actual),
    }
  }

  // --- PUBLIC API ---

  pub fn name(&self) -> &str {
    self.registry.name()
  }

  /// The registry backing this container.
  pub fn registry(&self) -> &Arc<BeanRegistry> {
    &self.registry
  }

  pub fn is_lazy_by_default(&self) -> bool {
    self.lazy_by_default
  }

  // --- Registration ---

  /// Registers a definition. Allowed before and after [`start`](Self::start); a
  /// definition registered on a running container is created on first lookup.
  pub fn register(&self, definition: BeanDefinition) -> Result<()> {
    self.registry.register(definition)
  }

  /// Registers an object built outside the container. It is available for lookup right
  /// away and never receives lifecycle callbacks.
  pub fn register_singleton<T: Any + Send + Sync>(
    &self,
    name: impl Into<String>,
    instance: Arc<T>,
  ) -> Result<()> {
    self.register(BeanDefinition::external(name, instance))
  }

  /// Shortcut for a dependency-free singleton.
  pub fn add_singleton<T: Any + Send + Sync>(
    &self,
    name: impl Into<String>,
    supplier: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<()> {
    self.register(BeanDefinition::builder::<T>(name).supplier(supplier).build()?)
  }

  /// Shortcut for a dependency-free prototype.
  pub fn add_prototype<T: Any + Send + Sync>(
    &self,
    name: impl Into<String>,
    supplier: impl Fn() -> T + Send + Sync + 'static,
  ) -> Result<()> {
    self.register(
      BeanDefinition::builder::<T>(name)
        .supplier(supplier)
        .prototype()
        .build()?,
    )
  }

  /// Makes `parent` the fallback for lookups that miss in this container.
  pub fn set_parent(&self, parent: &Container) -> Result<()> {
    self.registry.set_parent(parent.registry.clone())
  }

  // --- Lifecycle ---

  /// Eagerly creates every non-lazy singleton, in registration order.
  ///
  /// If any bean fails, the singletons created so far are destroyed, the container is
  /// stopped and the error is returned.
  pub fn start(&self) -> Result<()> {
    if let Err(actual) = self
      .state
      .compare_exchange(CREATED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
    {
      return Err(self.invalid_state(state_name(CREATED), actual));
    }

    let eager: Vec<_> = self
      .registry
      .entries_in_order()
      .into_iter()
      .filter(|entry| {
        let definition = &entry.definition;
        definition.scope == Scope::Singleton
          && !definition.is_external()
          && !self.is_lazy(definition)
      })
      .collect();

    for entry in &eager {
      if let Err(err) = self.registry.obtain(entry) {
        warn!(
          container = %self.name(),
          bean = %entry.definition.name,
          error = %err,
          "startup failed, shutting down"
        );
        self.state.store(STOPPED, Ordering::Release);
        for failure in self.registry.shutdown() {
          warn!(
            container = %self.name(),
            %failure,
            "destroy callback failed during startup rollback"
          );
        }
        return Err(err);
      }
    }

    info!(container = %self.name(), eager = eager.len(), "container started");
    Ok(())
  }

  /// Destroys every managed singleton, last created first, and closes the registry.
  ///
  /// Every destroy callback runs; the ones that failed are reported together as
  /// [`BeanError::Shutdown`]. Stopping a container that was never started is allowed.
  pub fn stop(&self) -> Result<()> {
    let previous = self.state.swap(STOPPED, Ordering::AcqRel);
    if previous == STOPPED {
      return Err(self.invalid_state("created or running", previous));
    }

    let failures = self.registry.shutdown();
    info!(container = %self.name(), failures = failures.len(), "container stopped");
    if failures.is_empty() {
      Ok(())
    } else {
      Err(BeanError::Shutdown { failures })
    }
  }

  pub fn is_running(&self) -> bool {
    self.state.load(Ordering::Acquire) == RUNNING
  }

  pub fn is_stopped(&self) -> bool {
    self.state.load(Ordering::Acquire) == STOPPED
  }

  // --- Resolution ---

  /// Resolves a bean by name. See [`BeanRegistry::get_by_name`].
  pub fn get_by_name<T: ?Sized + Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
    self.registry.get_by_name::<T>(name)
  }

  /// Resolves a bean by type. See [`BeanRegistry::get_by_type`].
  pub fn get_by_type<T: ?Sized + Any + Send + Sync>(&self, name: Option<&str>) -> Result<Arc<T>> {
    self.registry.get_by_type::<T>(name)
  }

  pub fn get_provider<T: ?Sized + Any + Send + Sync>(&self) -> Provider<T> {
    self.registry.get_provider::<T>()
  }

  pub fn get_provider_named<T: ?Sized + Any + Send + Sync>(
    &self,
    name: impl Into<String>,
  ) -> Provider<T> {
    self.registry.get_provider_named::<T>(name)
  }

  pub fn get_if_available<T, F>(&self, default: F) -> Result<Arc<T>>
  where
    T: ?Sized + Any + Send + Sync,
    F: FnOnce() -> Arc<T>,
  {
    self.registry.get_if_available::<T, F>(default)
  }

  pub fn stream_all<T: ?Sized + Any + Send + Sync>(&self) -> BeanStream<T> {
    self.registry.stream_all::<T>()
  }

  /// Whether `name` is defined here or in any ancestor.
  pub fn contains(&self, name: &str) -> bool {
    self.registry.contains(name)
  }

  pub fn contains_local(&self, name: &str) -> bool {
    self.registry.contains_local(name)
  }

  pub fn get_definition(&self, name: &str) -> Result<Arc<BeanDefinition>> {
    self.registry.get_definition(name)
  }

  pub fn bean_state(&self, name: &str) -> Option<LifecycleState> {
    self.registry.bean_state(name)
  }
}

impl Drop for Container {
  fn drop(&mut self) {
    if !self.destroy_on_drop || self.is_stopped() {
      return;
    }
    if let Err(err) = self.stop() {
      warn!(container = %self.name(), error = %err, "container did not stop cleanly on drop");
    }
  }
}

impl std::fmt::Debug for Container {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Container")
      .field("registry", &self.registry)
      .field("state", &state_name(self.state.load(Ordering::Acquire)))
      .field("lazy_by_default", &self.lazy_by_default)
      .field("destroy_on_drop", &self.destroy_on_drop)
      .finish()
  }
}
