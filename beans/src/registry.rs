//! The bean registry: definitions, singleton instances and the parent link.

use crate::core::{BeanValue, ConstructionGuard, ConstructionKey, OwnerGuard, WaitGuard};
use crate::definition::{BeanDefinition, Scope, Strategy};
use crate::error::{BeanError, DestroyFailure, Lookup, Result};
use crate::instantiator::Instantiator;
use crate::lifecycle::{BeanInstance, LifecycleManager, LifecycleState};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// A registered definition and its position in registration order.
#[derive(Clone)]
pub(crate) struct DefinitionEntry {
  pub(crate) definition: Arc<BeanDefinition>,
  pub(crate) order: u64,
}

type SingletonCell = Arc<OnceCell<Arc<BeanInstance>>>;

/// Holds bean definitions and the singletons created from them.
///
/// Registries form a tree: each one may have a parent that is consulted when a name or
/// type is missing locally. A registry never changes its parent's contents and never
/// stops it.
pub struct BeanRegistry {
  id: u64,
  name: String,
  this: Weak<BeanRegistry>,
  definitions: DashMap<String, DefinitionEntry>,
  singletons: DashMap<String, SingletonCell>,
  // Managed singletons in the order they became ready; shutdown walks it backwards.
  creation_log: Mutex<Vec<Arc<BeanInstance>>>,
  parent: RwLock<Option<Arc<BeanRegistry>>>,
  next_order: AtomicU64,
  next_creation: AtomicU64,
  closed: AtomicBool,
}

impl BeanRegistry {
  /// Creates an empty registry. `name` only shows up in errors and logs.
  pub fn new(name: impl Into<String>) -> Arc<Self> {
    Self::with_id(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed), Some(name.into()))
  }

  pub(crate) fn unnamed() -> Arc<Self> {
    Self::with_id(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed), None)
  }

  fn with_id(id: u64, name: Option<String>) -> Arc<Self> {
    Arc::new_cyclic(|this| Self {
      id,
      name: name.unwrap_or_else(|| format!("registry-{}", id)),
      this: this.clone(),
      definitions: DashMap::new(),
      singletons: DashMap::new(),
      creation_log: Mutex::new(Vec::new()),
      parent: RwLock::new(None),
      next_order: AtomicU64::new(0),
      next_creation: AtomicU64::new(0),
      closed: AtomicBool::new(false),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub(crate) fn downgrade(&self) -> Weak<BeanRegistry> {
    self.this.clone()
  }

  // --- Definitions ---

  /// Registers a definition under its name.
  ///
  /// Fails with [`BeanError::DuplicateName`] if the name is already taken in this
  /// registry; the same name in a parent is fine and is shadowed from here on.
  pub fn register(&self, definition: BeanDefinition) -> Result<()> {
    self.ensure_open()?;
    let name = definition.name.clone();
    let definition = Arc::new(definition);

    match self.definitions.entry(name.clone()) {
      Entry::Occupied(_) => {
        return Err(BeanError::DuplicateName {
          name,
          registry: self.name.clone(),
        })
      }
      Entry::Vacant(vacant) => {
        vacant.insert(DefinitionEntry {
          definition: definition.clone(),
          order: self.next_order.fetch_add(1, Ordering::Relaxed),
        });
      }
    }

    if let Strategy::External(value) = &definition.strategy {
      let instance =
        BeanInstance::external(definition.clone(), value.clone(), self.next_creation());
      self
        .singletons
        .insert(name.clone(), Arc::new(OnceCell::with_value(Arc::new(instance))));
    }

    debug!(
      registry = %self.name,
      bean = %name,
      r#type = definition.type_name(),
      scope = ?definition.scope,
      external = definition.is_external(),
      "registered bean definition"
    );
    Ok(())
  }

  /// The local definition for `name`. Never consults the parent.
  pub fn get_definition(&self, name: &str) -> Result<Arc<BeanDefinition>> {
    self
      .entry(name)
      .map(|entry| entry.definition)
      .ok_or_else(|| BeanError::NotFound(Lookup::Name(name.to_owned())))
  }

  /// Whether `name` is defined in this registry, instantiated or not.
  pub fn contains_local(&self, name: &str) -> bool {
    self.definitions.contains_key(name)
  }

  /// Whether `name` is defined here or in any ancestor.
  pub fn contains(&self, name: &str) -> bool {
    self.contains_local(name) || self.parent().is_some_and(|parent| parent.contains(name))
  }

  /// Local definition names in registration order.
  pub fn definition_names(&self) -> Vec<String> {
    self
      .entries_in_order()
      .into_iter()
      .map(|entry| entry.definition.name.clone())
      .collect()
  }

  pub(crate) fn entry(&self, name: &str) -> Option<DefinitionEntry> {
    self.definitions.get(name).map(|entry| entry.value().clone())
  }

  pub(crate) fn entries_in_order(&self) -> Vec<DefinitionEntry> {
    let mut entries: Vec<DefinitionEntry> =
      self.definitions.iter().map(|entry| entry.value().clone()).collect();
    entries.sort_by_key(|entry| entry.order);
    entries
  }

  // --- Hierarchy ---

  pub fn parent(&self) -> Option<Arc<BeanRegistry>> {
    self.parent.read().clone()
  }

  /// Makes `parent` the fallback for lookups that miss locally.
  ///
  /// Fails with [`BeanError::CyclicHierarchy`] if `parent` is this registry or one of its
  /// descendants.
  pub fn set_parent(&self, parent: Arc<BeanRegistry>) -> Result<()> {
    let mut ancestor = Some(parent.clone());
    while let Some(current) = ancestor {
      if current.id == self.id {
        return Err(BeanError::CyclicHierarchy {
          registry: self.name.clone(),
          parent: parent.name.clone(),
        });
      }
      ancestor = current.parent();
    }

    debug!(registry = %self.name, parent = %parent.name, "parent registry set");
    *self.parent.write() = Some(parent);
    Ok(())
  }

  // --- Instances ---

  /// Whether a singleton named `name` has been created (or supplied) in this registry.
  pub fn is_instantiated(&self, name: &str) -> bool {
    self
      .singletons
      .get(name)
      .is_some_and(|cell| cell.get().is_some())
  }

  /// The lifecycle state of the local singleton `name`, if it exists.
  pub fn bean_state(&self, name: &str) -> Option<LifecycleState> {
    self
      .singletons
      .get(name)
      .and_then(|cell| cell.get().map(|instance| instance.state()))
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  pub(crate) fn ensure_open(&self) -> Result<()> {
    if self.is_closed() {
      return Err(BeanError::Closed {
        registry: self.name.clone(),
      });
    }
    Ok(())
  }

  fn next_creation(&self) -> u64 {
    self.next_creation.fetch_add(1, Ordering::Relaxed)
  }

  fn construction_key(&self, bean: &str) -> ConstructionKey {
    ConstructionKey {
      registry: self.id,
      bean: bean.to_owned(),
    }
  }

  /// Returns the bean for `entry`, creating it if needed.
  ///
  /// Singletons are created at most once: concurrent first requests wait on the same
  /// cell and observe the same instance. Prototypes are created on every call.
  pub(crate) fn obtain(&self, entry: &DefinitionEntry) -> Result<BeanValue> {
    self.ensure_open()?;
    match entry.definition.scope {
      Scope::Singleton => self.obtain_singleton(entry).map(|instance| instance.value.clone()),
      Scope::Prototype => {
        let _guard = ConstructionGuard::enter(self.construction_key(&entry.definition.name))?;
        self.create(&entry.definition).map(|instance| instance.value.clone())
      }
    }
  }

  fn obtain_singleton(&self, entry: &DefinitionEntry) -> Result<Arc<BeanInstance>> {
    let name = &entry.definition.name;
    let cell = self.singletons.entry(name.clone()).or_default().clone();
    if let Some(instance) = cell.get() {
      trace!(registry = %self.name, bean = %name, "returning cached singleton");
      return Ok(instance.clone());
    }

    let key = self.construction_key(name);
    let _guard = ConstructionGuard::enter(key.clone())?;
    let _waiting = WaitGuard::enter(&key)?;
    cell
      .get_or_try_init(|| {
        let _owner = OwnerGuard::claim(key.clone());
        let instance = self.create(&entry.definition)?;
        self.record_created(instance)
      })
      .cloned()
  }

  /// Appends a freshly created singleton to the creation log. If the registry was shut
  /// down while the bean was being built, it is destroyed right away instead.
  fn record_created(&self, instance: Arc<BeanInstance>) -> Result<Arc<BeanInstance>> {
    let mut log = self.creation_log.lock();
    if self.is_closed() {
      drop(log);
      debug!(
        registry = %self.name,
        bean = %instance.name(),
        "registry closed during creation"
      );
      for failure in LifecycleManager::destroy(&instance) {
        warn!(registry = %self.name, %failure, "destroy callback failed after shutdown");
      }
      return Err(BeanError::Closed {
        registry: self.name.clone(),
      });
    }
    log.push(instance.clone());
    Ok(instance)
  }

  fn create(&self, definition: &Arc<BeanDefinition>) -> Result<Arc<BeanInstance>> {
    let value = Instantiator::new(self).instantiate(definition)?;
    let instance = Arc::new(BeanInstance::constructed(
      definition.clone(),
      value,
      self.next_creation(),
    ));
    LifecycleManager::initialize(&instance)?;
    debug!(
      registry = %self.name,
      bean = %definition.name,
      creation_index = instance.creation_index,
      scope = ?definition.scope,
      "bean ready"
    );
    Ok(instance)
  }

  /// Closes the registry and destroys every managed singleton, last created first.
  ///
  /// Returns the destroy callbacks that failed; a failure never stops the rest of the
  /// teardown. Only the first call does any work.
  pub(crate) fn shutdown(&self) -> Vec<DestroyFailure> {
    let created = {
      // Closing under the log lock keeps in-flight creations from slipping in afterwards.
      let mut log = self.creation_log.lock();
      if self.closed.swap(true, Ordering::AcqRel) {
        return Vec::new();
      }
      std::mem::take(&mut *log)
    };
    debug!(registry = %self.name, singletons = created.len(), "destroying singletons");
    let failures = LifecycleManager::destroy_in_reverse(created);
    self.singletons.clear();
    failures
  }
}

impl fmt::Debug for BeanRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BeanRegistry")
      .field("name", &self.name)
      .field("definitions", &self.definitions.len())
      .field("singletons", &self.singletons.len())
      .field("parent", &self.parent().map(|p| p.name.clone()))
      .field("closed", &self.is_closed())
      .finish()
  }
}
