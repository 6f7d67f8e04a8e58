use crate::container::Container;
use crate::definition::BeanDefinition;
use crate::error::Result;
use crate::registry::BeanRegistry;

use std::fmt;
use std::sync::Arc;

/// A builder for creating a [`Container`].
///
/// ```
/// use fibre_beans::{BeanDefinition, Container};
///
/// let parent = Container::named("parent");
/// let container = Container::builder()
///   .name("child")
///   .parent(&parent)
///   .lazy_by_default(true)
///   .definition(
///     BeanDefinition::builder::<String>("greeting")
///       .supplier(|| "Hello".into())
///       .build()
///       .unwrap(),
///   )
///   .build()
///   .unwrap();
/// assert!(container.contains_local("greeting"));
/// ```
pub struct ContainerBuilder {
  name: Option<String>,
  parent: Option<Arc<BeanRegistry>>,
  lazy_by_default: bool,
  destroy_on_drop: bool,
  definitions: Vec<BeanDefinition>,
}

// Manual Debug implementation for ContainerBuilder.
impl fmt::Debug for ContainerBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContainerBuilder")
      .field("name", &self.name)
      .field("parent", &self.parent.as_ref().map(|p| p.name().to_owned()))
      .field("lazy_by_default", &self.lazy_by_default)
      .field("destroy_on_drop", &self.destroy_on_drop)
      .field("definitions", &self.definitions.len())
      .finish()
  }
}

impl Default for ContainerBuilder {
  fn default() -> Self {
    Self {
      name: None,
      parent: None,
      lazy_by_default: false,
      destroy_on_drop: true,
      definitions: Vec::new(),
    }
  }
}

impl ContainerBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sets the registry name shown in errors and logs.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Uses `parent` as the fallback for lookups that miss locally.
  pub fn parent(self, parent: &Container) -> Self {
    self.parent_registry(parent.registry().clone())
  }

  pub fn parent_registry(mut self, parent: Arc<BeanRegistry>) -> Self {
    self.parent = Some(parent);
    self
  }

  /// Whether singletons without an explicit `lazy` flag wait for their first lookup
  /// instead of being created by `start`. Defaults to `false`.
  pub fn lazy_by_default(mut self, lazy: bool) -> Self {
    self.lazy_by_default = lazy;
    self
  }

  /// Whether dropping a container that was not stopped runs `stop`. Defaults to `true`.
  pub fn destroy_on_drop(mut self, destroy: bool) -> Self {
    self.destroy_on_drop = destroy;
    self
  }

  /// Adds a definition to register when the container is built.
  pub fn definition(mut self, definition: BeanDefinition) -> Self {
    self.definitions.push(definition);
    self
  }

  /// Builds the container and registers the collected definitions in order.
  ///
  /// # Errors
  ///
  /// Returns the first registration error, such as a duplicate name.
  pub fn build(self) -> Result<Container> {
    let registry = match self.name {
      Some(name) => BeanRegistry::new(name),
      None => BeanRegistry::unnamed(),
    };
    if let Some(parent) = self.parent {
      registry.set_parent(parent)?;
    }
    for definition in self.definitions {
      registry.register(definition)?;
    }
    Ok(Container::from_parts(registry, self.lazy_by_default, self.destroy_on_drop))
  }
}
