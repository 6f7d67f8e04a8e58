//! Bean lifecycle: instance states and the ordered init / destroy callbacks.

use crate::core::BeanValue;
use crate::definition::BeanDefinition;
use crate::error::{BeanError, BoxError, DestroyFailure, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Implemented by beans that want a hook once the container has built them.
///
/// Opt in with [`initializing_bean`](crate::BeanDefinitionBuilder::initializing_bean).
pub trait InitializingBean {
  fn after_properties_set(&self) -> Result<(), BoxError>;
}

/// Implemented by beans that release resources when the container shuts down.
///
/// Opt in with [`disposable_bean`](crate::BeanDefinitionBuilder::disposable_bean).
pub trait DisposableBean {
  fn destroy(&self) -> Result<(), BoxError>;
}

/// Where a managed bean instance is in its life.
///
/// States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LifecycleState {
  Constructed = 0,
  Initializing = 1,
  Ready = 2,
  Destroying = 3,
  Destroyed = 4,
}

impl LifecycleState {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => LifecycleState::Constructed,
      1 => LifecycleState::Initializing,
      2 => LifecycleState::Ready,
      3 => LifecycleState::Destroying,
      _ => LifecycleState::Destroyed,
    }
  }
}

/// A realized bean plus its bookkeeping.
pub(crate) struct BeanInstance {
  pub(crate) definition: Arc<BeanDefinition>,
  pub(crate) value: BeanValue,
  pub(crate) creation_index: u64,
  state: AtomicU8,
}

impl BeanInstance {
  pub(crate) fn constructed(
    definition: Arc<BeanDefinition>,
    value: BeanValue,
    creation_index: u64,
  ) -> Self {
    Self {
      definition,
      value,
      creation_index,
      state: AtomicU8::new(LifecycleState::Constructed as u8),
    }
  }

  /// External objects are usable immediately and never move through callbacks.
  pub(crate) fn external(
    definition: Arc<BeanDefinition>,
    value: BeanValue,
    creation_index: u64,
  ) -> Self {
    Self {
      definition,
      value,
      creation_index,
      state: AtomicU8::new(LifecycleState::Ready as u8),
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.definition.name
  }

  pub(crate) fn is_external(&self) -> bool {
    self.definition.is_external()
  }

  pub(crate) fn state(&self) -> LifecycleState {
    LifecycleState::from_u8(self.state.load(Ordering::Acquire))
  }

  /// Moves `from -> to` atomically. Returns `false` if the instance was not in `from`.
  fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
    debug_assert!(from < to);
    self
      .state
      .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }
}

/// Drives init and destroy callbacks in their fixed order.
pub(crate) struct LifecycleManager;

impl LifecycleManager {
  /// Runs post-construct, after-properties-set and the init method, then marks the bean
  /// ready. The first failing callback aborts initialization.
  pub(crate) fn initialize(instance: &BeanInstance) -> Result<()> {
    if instance.is_external() {
      return Ok(());
    }
    if !instance.transition(LifecycleState::Constructed, LifecycleState::Initializing) {
      return Ok(());
    }

    for callback in instance.definition.init.ordered() {
      debug!(bean = %instance.name(), callback = %callback.label, "running init callback");
      callback
        .invoke(&instance.value)
        .map_err(|source| BeanError::Initialization {
          bean: instance.name().to_owned(),
          callback: callback.label.clone(),
          source,
        })?;
    }

    instance.transition(LifecycleState::Initializing, LifecycleState::Ready);
    Ok(())
  }

  /// Runs pre-destroy, destroy and the destroy method. Every callback runs even if an
  /// earlier one failed. Calling this twice on the same instance does nothing the
  /// second time.
  pub(crate) fn destroy(instance: &BeanInstance) -> Vec<DestroyFailure> {
    let mut failures = Vec::new();
    if instance.is_external()
      || !instance.transition(LifecycleState::Ready, LifecycleState::Destroying)
    {
      return failures;
    }

    for callback in instance.definition.destroy.ordered() {
      debug!(bean = %instance.name(), callback = %callback.label, "running destroy callback");
      if let Err(source) = callback.invoke(&instance.value) {
        warn!(
          bean = %instance.name(),
          callback = %callback.label,
          error = %source,
          "destroy callback failed"
        );
        failures.push(DestroyFailure {
          bean: instance.name().to_owned(),
          callback: callback.label.clone(),
          source,
        });
      }
    }

    instance.transition(LifecycleState::Destroying, LifecycleState::Destroyed);
    failures
  }

  /// Destroys `instances` last-created first.
  pub(crate) fn destroy_in_reverse(instances: Vec<Arc<BeanInstance>>) -> Vec<DestroyFailure> {
    instances
      .iter()
      .rev()
      .flat_map(|instance| Self::destroy(instance))
      .collect()
  }
}
