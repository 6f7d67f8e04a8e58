//! Bean definitions: the registered recipe for producing a bean.

use crate::core::{BeanValue, TypeBinding, TypeKey};
use crate::error::{BeanError, BoxError, Lookup, Result};
use crate::instantiator::Dependencies;
use crate::lifecycle::{DisposableBean, InitializingBean};
use crate::lookup::ResolvedBean;
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// How many instances a definition produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
  /// One shared instance per registry, reused by every lookup.
  #[default]
  Singleton,
  /// A fresh, unshared instance for every lookup or injection.
  Prototype,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefTarget {
  Name(String),
  Type { key: TypeKey, name: Option<String> },
}

/// A reference from one bean to another, by name or by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
  pub(crate) target: RefTarget,
  optional: bool,
}

impl DependencyRef {
  /// References the bean registered under `name`.
  pub fn name(name: impl Into<String>) -> Self {
    Self {
      target: RefTarget::Name(name.into()),
      optional: false,
    }
  }

  /// References the single (or primary) bean that can be looked up as `T`.
  pub fn of<T: ?Sized + Any + Send + Sync>() -> Self {
    Self {
      target: RefTarget::Type {
        key: TypeKey::of::<T>(),
        name: None,
      },
      optional: false,
    }
  }

  /// References the bean named `name` that can be looked up as `T`.
  pub fn of_named<T: ?Sized + Any + Send + Sync>(name: impl Into<String>) -> Self {
    Self {
      target: RefTarget::Type {
        key: TypeKey::of::<T>(),
        name: Some(name.into()),
      },
      optional: false,
    }
  }

  /// Marks the reference as optional: a missing bean is injected as absent.
  pub fn optional(mut self) -> Self {
    self.optional = true;
    self
  }

  pub fn is_optional(&self) -> bool {
    self.optional
  }

  pub(crate) fn lookup(&self) -> Lookup {
    match &self.target {
      RefTarget::Name(name) => Lookup::Name(name.clone()),
      RefTarget::Type { key, name } => Lookup::Type {
        type_name: key.type_name,
        name: name.clone(),
      },
    }
  }
}

pub(crate) type ConstructFn = Arc<dyn Fn(&Dependencies) -> Result<BeanValue> + Send + Sync>;
pub(crate) type FactoryFn =
  Arc<dyn Fn(Option<&ResolvedBean>, &Dependencies) -> Result<BeanValue> + Send + Sync>;
type HookFn = Arc<dyn Fn(&BeanValue) -> Result<(), BoxError> + Send + Sync>;

/// Where a factory method is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryTarget {
  /// A free function; nothing needs to be resolved first.
  Static,
  /// A method on another bean, resolved like any other dependency.
  Bean(DependencyRef),
}

#[derive(Clone)]
pub(crate) enum Strategy {
  Constructor(ConstructFn),
  Factory {
    target: FactoryTarget,
    method: String,
    produce: FactoryFn,
  },
  External(BeanValue),
}

/// A single lifecycle callback together with the label used in errors and logs.
#[derive(Clone)]
pub(crate) struct Callback {
  pub(crate) label: String,
  run: HookFn,
}

impl Callback {
  fn typed<T, F>(label: String, f: F) -> Self
  where
    T: Any + Send + Sync,
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    Self {
      label,
      run: Arc::new(move |value: &BeanValue| match (**value).downcast_ref::<T>() {
        Some(bean) => f(bean),
        None => Err(format!("bean is not a {}", std::any::type_name::<T>()).into()),
      }),
    }
  }

  pub(crate) fn invoke(&self, value: &BeanValue) -> Result<(), BoxError> {
    (self.run)(value)
  }
}

/// Init callbacks, invoked in field order.
#[derive(Clone, Default)]
pub(crate) struct InitCallbacks {
  pub(crate) post_construct: Option<Callback>,
  pub(crate) after_properties_set: Option<Callback>,
  pub(crate) init_method: Option<Callback>,
}

impl InitCallbacks {
  pub(crate) fn ordered(&self) -> impl Iterator<Item = &Callback> {
    [
      self.post_construct.as_ref(),
      self.after_properties_set.as_ref(),
      self.init_method.as_ref(),
    ]
    .into_iter()
    .flatten()
  }

  fn is_empty(&self) -> bool {
    self.ordered().next().is_none()
  }
}

/// Destroy callbacks, invoked in field order.
#[derive(Clone, Default)]
pub(crate) struct DestroyCallbacks {
  pub(crate) pre_destroy: Option<Callback>,
  pub(crate) destroy: Option<Callback>,
  pub(crate) destroy_method: Option<Callback>,
}

impl DestroyCallbacks {
  pub(crate) fn ordered(&self) -> impl Iterator<Item = &Callback> {
    [
      self.pre_destroy.as_ref(),
      self.destroy.as_ref(),
      self.destroy_method.as_ref(),
    ]
    .into_iter()
    .flatten()
  }

  fn is_empty(&self) -> bool {
    self.ordered().next().is_none()
  }
}

/// The immutable recipe for one bean.
///
/// Built with [`BeanDefinition::builder`] and handed to a registry; it never changes
/// after that.
pub struct BeanDefinition {
  pub(crate) name: String,
  pub(crate) bindings: Vec<TypeBinding>,
  pub(crate) strategy: Strategy,
  pub(crate) dependencies: Vec<DependencyRef>,
  pub(crate) scope: Scope,
  pub(crate) lazy: Option<bool>,
  pub(crate) primary: bool,
  pub(crate) init: InitCallbacks,
  pub(crate) destroy: DestroyCallbacks,
}

impl BeanDefinition {
  /// Starts a definition for a bean of type `T` registered under `name`.
  pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanDefinitionBuilder<T> {
    BeanDefinitionBuilder::new(name.into())
  }

  /// A definition wrapping an object that was constructed outside the container.
  pub fn external<T: Any + Send + Sync>(name: impl Into<String>, instance: Arc<T>) -> Self {
    Self {
      name: name.into(),
      bindings: vec![TypeBinding::concrete::<T>()],
      strategy: Strategy::External(instance),
      dependencies: Vec::new(),
      scope: Scope::Singleton,
      lazy: None,
      primary: false,
      init: InitCallbacks::default(),
      destroy: DestroyCallbacks::default(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// The name of the concrete type this definition produces.
  pub fn type_name(&self) -> &'static str {
    self.bindings[0].key.type_name
  }

  /// Names of every type the bean can be looked up as, concrete type first.
  pub fn exposed_type_names(&self) -> Vec<&'static str> {
    self.bindings.iter().map(|b| b.key.type_name).collect()
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  /// The explicit laziness flag, or `None` to follow the container default.
  pub fn lazy(&self) -> Option<bool> {
    self.lazy
  }

  pub fn is_primary(&self) -> bool {
    self.primary
  }

  pub fn is_external(&self) -> bool {
    matches!(self.strategy, Strategy::External(_))
  }

  pub fn dependencies(&self) -> &[DependencyRef] {
    &self.dependencies
  }

  /// The factory method name, for factory-method definitions.
  pub fn factory_method(&self) -> Option<&str> {
    match &self.strategy {
      Strategy::Factory { method, .. } => Some(method),
      _ => None,
    }
  }

  pub(crate) fn exposes(&self, type_id: TypeId) -> bool {
    self.bindings.iter().any(|b| b.key.type_id == type_id)
  }
}

impl fmt::Debug for BeanDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let strategy = match &self.strategy {
      Strategy::Constructor(_) => "constructor".to_owned(),
      Strategy::Factory { method, .. } => format!("factory method '{}'", method),
      Strategy::External(_) => "external instance".to_owned(),
    };
    f.debug_struct("BeanDefinition")
      .field("name", &self.name)
      .field("types", &self.exposed_type_names())
      .field("strategy", &strategy)
      .field("dependencies", &self.dependencies)
      .field("scope", &self.scope)
      .field("lazy", &self.lazy)
      .field("primary", &self.primary)
      .finish_non_exhaustive()
  }
}

/// A typed builder for [`BeanDefinition`].
///
/// Exactly one construction strategy must be chosen: [`constructor`](Self::constructor),
/// [`supplier`](Self::supplier), [`factory_method`](Self::factory_method),
/// [`factory_bean`](Self::factory_bean) or [`instance`](Self::instance). Lifecycle
/// callbacks always run in their fixed order no matter the order they are declared in.
pub struct BeanDefinitionBuilder<T> {
  name: String,
  bindings: Vec<TypeBinding>,
  strategy: Option<Strategy>,
  dependencies: Vec<DependencyRef>,
  scope: Scope,
  lazy: Option<bool>,
  primary: bool,
  init: InitCallbacks,
  destroy: DestroyCallbacks,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanDefinitionBuilder<T> {
  fn new(name: String) -> Self {
    Self {
      name,
      bindings: vec![TypeBinding::concrete::<T>()],
      strategy: None,
      dependencies: Vec::new(),
      scope: Scope::Singleton,
      lazy: None,
      primary: false,
      init: InitCallbacks::default(),
      destroy: DestroyCallbacks::default(),
      _marker: PhantomData,
    }
  }

  // --- Construction strategies ---

  /// Builds the bean from its resolved [`depends_on`](Self::depends_on) references.
  pub fn constructor<F>(mut self, construct: F) -> Self
  where
    F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let bean = self.name.clone();
    self.strategy = Some(Strategy::Constructor(Arc::new(move |deps: &Dependencies| {
      construct(deps)
        .map(|value| Arc::new(value) as BeanValue)
        .map_err(|source| BeanError::Construction {
          bean: bean.clone(),
          source,
        })
    })));
    self
  }

  /// Builds the bean from a closure with no dependencies.
  pub fn supplier<F>(self, supply: F) -> Self
  where
    F: Fn() -> T + Send + Sync + 'static,
  {
    self.constructor(move |_| Ok(supply()))
  }

  /// Builds the bean with a static factory function.
  pub fn factory_method<F>(mut self, method: impl Into<String>, produce: F) -> Self
  where
    F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let bean = self.name.clone();
    self.strategy = Some(Strategy::Factory {
      target: FactoryTarget::Static,
      method: method.into(),
      produce: Arc::new(move |_, deps: &Dependencies| {
        produce(deps)
          .map(|value| Arc::new(value) as BeanValue)
          .map_err(|source| BeanError::Construction {
            bean: bean.clone(),
            source,
          })
      }),
    });
    self
  }

  /// Builds the bean by calling `method` on another bean of type `B`.
  pub fn factory_bean<B, F>(
    mut self,
    target: DependencyRef,
    method: impl Into<String>,
    produce: F,
  ) -> Self
  where
    B: ?Sized + Any + Send + Sync,
    F: Fn(&B, &Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
  {
    let bean = self.name.clone();
    let lookup = target.lookup();
    self.strategy = Some(Strategy::Factory {
      target: FactoryTarget::Bean(target),
      method: method.into(),
      produce: Arc::new(move |target: Option<&ResolvedBean>, deps: &Dependencies| {
        let factory = target
          .ok_or_else(|| BeanError::UnresolvedDependency {
            bean: bean.clone(),
            dependency: lookup.clone(),
          })?
          .cast::<B>()?;
        produce(&*factory, deps)
          .map(|value| Arc::new(value) as BeanValue)
          .map_err(|source| BeanError::Construction {
            bean: bean.clone(),
            source,
          })
      }),
    });
    self
  }

  /// Uses an already constructed object. The container only tracks it for lookup and
  /// never runs lifecycle callbacks on it.
  pub fn instance(mut self, instance: Arc<T>) -> Self {
    self.strategy = Some(Strategy::External(instance));
    self
  }

  // --- Wiring ---

  /// Appends a dependency; constructors see them in declaration order.
  pub fn depends_on(mut self, dependency: DependencyRef) -> Self {
    self.dependencies.push(dependency);
    self
  }

  pub fn scope(mut self, scope: Scope) -> Self {
    self.scope = scope;
    self
  }

  pub fn prototype(self) -> Self {
    self.scope(Scope::Prototype)
  }

  pub fn lazy(mut self, lazy: bool) -> Self {
    self.lazy = Some(lazy);
    self
  }

  /// Marks this bean as the winner of otherwise ambiguous type lookups.
  pub fn primary(mut self) -> Self {
    self.primary = true;
    self
  }

  /// Makes the bean available under another type, usually a trait object:
  ///
  /// ```
  /// use fibre_beans::BeanDefinition;
  /// use std::sync::Arc;
  ///
  /// trait Greeter: Send + Sync {}
  /// struct English;
  /// impl Greeter for English {}
  ///
  /// let definition = BeanDefinition::builder::<English>("greeter")
  ///   .supplier(|| English)
  ///   .expose::<dyn Greeter>(|bean| bean as Arc<dyn Greeter>)
  ///   .build()
  ///   .unwrap();
  /// assert_eq!(definition.exposed_type_names().len(), 2);
  /// ```
  pub fn expose<I>(mut self, upcast: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static) -> Self
  where
    I: ?Sized + Any + Send + Sync,
  {
    let binding = TypeBinding::exposed::<T, I, _>(upcast);
    match self.bindings.iter().position(|b| b.key == binding.key) {
      Some(existing) => self.bindings[existing] = binding,
      None => self.bindings.push(binding),
    }
    self
  }

  // --- Lifecycle callbacks ---

  /// Runs first during initialization.
  pub fn post_construct<F>(mut self, callback: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.init.post_construct = Some(Callback::typed("post-construct".to_owned(), callback));
    self
  }

  /// Runs last during initialization.
  pub fn init_method<F>(mut self, name: impl Into<String>, callback: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let label = format!("init method '{}'", name.into());
    self.init.init_method = Some(Callback::typed(label, callback));
    self
  }

  /// Runs first during destruction.
  pub fn pre_destroy<F>(mut self, callback: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    self.destroy.pre_destroy = Some(Callback::typed("pre-destroy".to_owned(), callback));
    self
  }

  /// Runs last during destruction.
  pub fn destroy_method<F>(mut self, name: impl Into<String>, callback: F) -> Self
  where
    F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
  {
    let label = format!("destroy method '{}'", name.into());
    self.destroy.destroy_method = Some(Callback::typed(label, callback));
    self
  }

  /// Validates and freezes the definition.
  pub fn build(self) -> Result<BeanDefinition> {
    let invalid = |reason: &str| BeanError::InvalidDefinition {
      bean: self.name.clone(),
      reason: reason.to_owned(),
    };

    if self.name.is_empty() {
      return Err(invalid("bean name must not be empty"));
    }
    let strategy = match &self.strategy {
      Some(strategy) => strategy.clone(),
      None => return Err(invalid("no construction strategy was given")),
    };
    if let Strategy::External(_) = strategy {
      if self.scope == Scope::Prototype {
        return Err(invalid("an external instance cannot have prototype scope"));
      }
      if !self.init.is_empty() || !self.destroy.is_empty() {
        return Err(invalid("an external instance cannot declare lifecycle callbacks"));
      }
      if !self.dependencies.is_empty() {
        return Err(invalid("an external instance cannot declare dependencies"));
      }
    }

    Ok(BeanDefinition {
      name: self.name,
      bindings: self.bindings,
      strategy,
      dependencies: self.dependencies,
      scope: self.scope,
      lazy: self.lazy,
      primary: self.primary,
      init: self.init,
      destroy: self.destroy,
    })
  }
}

impl<T: InitializingBean + Any + Send + Sync> BeanDefinitionBuilder<T> {
  /// Calls [`InitializingBean::after_properties_set`] between post-construct and the init method.
  pub fn initializing_bean(mut self) -> Self {
    self.init.after_properties_set = Some(Callback::typed(
      "after-properties-set".to_owned(),
      |bean: &T| bean.after_properties_set(),
    ));
    self
  }
}

impl<T: DisposableBean + Any + Send + Sync> BeanDefinitionBuilder<T> {
  /// Calls [`DisposableBean::destroy`] between pre-destroy and the destroy method.
  pub fn disposable_bean(mut self) -> Self {
    self.destroy.destroy = Some(Callback::typed("destroy".to_owned(), |bean: &T| {
      bean.destroy()
    }));
    self
  }
}
