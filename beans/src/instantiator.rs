//! Turns a definition into a bean value: resolves its dependencies and runs its
//! constructor or factory method.

use crate::core::BeanValue;
use crate::definition::{BeanDefinition, DependencyRef, FactoryTarget, Strategy};
use crate::error::{BeanError, Lookup, Result};
use crate::lookup::ResolvedBean;
use crate::provider::Provider;
use crate::registry::BeanRegistry;
use std::any::Any;
use std::sync::{Arc, Weak};
use tracing::trace;

/// The resolved dependencies handed to a constructor or factory method, in the order
/// they were declared with `depends_on`.
pub struct Dependencies {
  bean: String,
  refs: Vec<DependencyRef>,
  resolved: Vec<Option<ResolvedBean>>,
  registry: Weak<BeanRegistry>,
  registry_name: String,
}

impl Dependencies {
  pub fn len(&self) -> usize {
    self.resolved.len()
  }

  pub fn is_empty(&self) -> bool {
    self.resolved.is_empty()
  }

  /// The required dependency at `index`, as `T`.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
    match self.get_optional::<T>(index)? {
      Some(bean) => Ok(bean),
      None => Err(BeanError::UnresolvedDependency {
        bean: self.bean.clone(),
        dependency: self.refs[index].lookup(),
      }),
    }
  }

  /// The dependency at `index`, or `None` if it was optional and missing.
  pub fn get_optional<T: ?Sized + Any + Send + Sync>(
    &self,
    index: usize,
  ) -> Result<Option<Arc<T>>> {
    match self.resolved.get(index) {
      Some(Some(resolved)) => resolved.cast::<T>().map(Some),
      Some(None) => Ok(None),
      None => Err(BeanError::InvalidDefinition {
        bean: self.bean.clone(),
        reason: format!("no dependency declared at index {}", index),
      }),
    }
  }

  /// The name of the bean injected at `index`.
  pub fn bean_name(&self, index: usize) -> Option<&str> {
    self
      .resolved
      .get(index)
      .and_then(Option::as_ref)
      .map(|resolved| resolved.definition.name.as_str())
  }

  /// A lazy handle on the owning registry, for dependencies that should only be looked
  /// up when they are first used.
  pub fn provider<T: ?Sized + Any + Send + Sync>(&self) -> Provider<T> {
    Provider::new(self.registry.clone(), self.registry_name.clone(), None)
  }

  pub fn provider_named<T: ?Sized + Any + Send + Sync>(
    &self,
    name: impl Into<String>,
  ) -> Provider<T> {
    Provider::new(self.registry.clone(), self.registry_name.clone(), Some(name.into()))
  }
}

/// Builds bean values for one registry.
pub(crate) struct Instantiator<'r> {
  registry: &'r BeanRegistry,
}

impl<'r> Instantiator<'r> {
  pub(crate) fn new(registry: &'r BeanRegistry) -> Self {
    Self { registry }
  }

  pub(crate) fn instantiate(&self, definition: &BeanDefinition) -> Result<BeanValue> {
    match &definition.strategy {
      Strategy::External(value) => Ok(value.clone()),
      Strategy::Constructor(construct) => {
        let dependencies = self.resolve_dependencies(definition)?;
        trace!(bean = %definition.name, "invoking constructor");
        construct(&dependencies)
      }
      Strategy::Factory {
        target,
        method,
        produce,
      } => {
        let target = match target {
          FactoryTarget::Static => None,
          FactoryTarget::Bean(reference) => Some(self.resolve_required(definition, reference)?),
        };
        let dependencies = self.resolve_dependencies(definition)?;
        trace!(bean = %definition.name, method = %method, "invoking factory method");
        produce(target.as_ref(), &dependencies)
      }
    }
  }

  fn resolve_dependencies(&self, definition: &BeanDefinition) -> Result<Dependencies> {
    let resolved = definition
      .dependencies
      .iter()
      .map(|reference| self.resolve_reference(definition, reference))
      .collect::<Result<Vec<_>>>()?;

    Ok(Dependencies {
      bean: definition.name.clone(),
      refs: definition.dependencies.clone(),
      resolved,
      registry: self.registry.downgrade(),
      registry_name: self.registry.name().to_owned(),
    })
  }

  fn resolve_required(
    &self,
    definition: &BeanDefinition,
    reference: &DependencyRef,
  ) -> Result<ResolvedBean> {
    self
      .resolve_reference(definition, reference)?
      .ok_or_else(|| unresolved(definition, reference.lookup()))
  }

  /// Only a lookup miss on an optional reference is recovered from; ambiguity, cycles
  /// and failed initialization always propagate.
  fn resolve_reference(
    &self,
    definition: &BeanDefinition,
    reference: &DependencyRef,
  ) -> Result<Option<ResolvedBean>> {
    match self.registry.resolve_dependency(reference) {
      Ok(resolved) => Ok(Some(resolved)),
      Err(BeanError::NotFound(_)) if reference.is_optional() => {
        trace!(
          bean = %definition.name,
          dependency = %reference.lookup(),
          "optional dependency is absent"
        );
        Ok(None)
      }
      Err(BeanError::NotFound(lookup)) => Err(unresolved(definition, lookup)),
      Err(other) => Err(other),
    }
  }
}

fn unresolved(definition: &BeanDefinition, dependency: Lookup) -> BeanError {
  BeanError::UnresolvedDependency {
    bean: definition.name.clone(),
    dependency,
  }
}
