//! Core, non-public data structures shared by the registry and its collaborators.

use crate::error::{BeanError, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

thread_local! {
  // Beans currently under construction on this thread, in the order they were entered.
  // A bean that shows up twice means a dependency cycle.
  static CONSTRUCTION_STACK: RefCell<Vec<ConstructionKey>> = const { RefCell::new(Vec::new()) };
}

// Singleton constructions in flight on any thread, and the bean each blocked thread is
// waiting for. Together they form the waits-for graph checked by `WaitGuard`.
static IN_FLIGHT: Lazy<Mutex<InFlight>> = Lazy::new(|| Mutex::new(InFlight::default()));

#[derive(Default)]
struct InFlight {
  owners: HashMap<ConstructionKey, ThreadId>,
  waiting: HashMap<ThreadId, ConstructionKey>,
}

/// A realized bean, always the concrete `Arc<T>` of its definition behind `dyn Any`.
pub(crate) type BeanValue = Arc<dyn Any + Send + Sync>;

/// Identifies a bean under construction: the owning registry plus the bean name.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct ConstructionKey {
  pub(crate) registry: u64,
  pub(crate) bean: String,
}

impl fmt::Debug for ConstructionKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Key(Registry({}), Bean({}))", self.registry, self.bean)
  }
}

/// An RAII guard that marks a bean as "in construction" on the current thread.
///
/// Entering a bean that is already on the stack fails with
/// [`BeanError::CircularDependency`] instead of recursing forever or deadlocking on the
/// singleton cell. Dropping the guard pops the bean again.
pub(crate) struct ConstructionGuard {
  key: ConstructionKey,
}

impl ConstructionGuard {
  pub(crate) fn enter(key: ConstructionKey) -> Result<Self> {
    CONSTRUCTION_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      if let Some(start) = stack.iter().position(|entered| *entered == key) {
        let mut chain: Vec<String> = stack[start..].iter().map(|k| k.bean.clone()).collect();
        chain.push(key.bean.clone());
        return Err(BeanError::CircularDependency { chain });
      }
      stack.push(key.clone());
      Ok(())
    })?;
    Ok(Self { key })
  }
}

impl Drop for ConstructionGuard {
  fn drop(&mut self) {
    CONSTRUCTION_STACK.with(|stack| {
      let mut stack = stack.borrow_mut();
      if let Some(pos) = stack.iter().rposition(|entered| *entered == self.key) {
        stack.remove(pos);
      }
    });
  }
}

/// Registers the current thread as waiting for the singleton `key`.
///
/// Another thread may already be building `key` while itself waiting, directly or through
/// other threads, for a bean this thread is building. Blocking then would never return,
/// so `enter` walks the waits-for chain first and fails with
/// [`BeanError::CircularDependency`] when it leads back here.
pub(crate) struct WaitGuard {
  thread: ThreadId,
}

impl WaitGuard {
  pub(crate) fn enter(key: &ConstructionKey) -> Result<Self> {
    let me = thread::current().id();
    let mut in_flight = IN_FLIGHT.lock();

    let mut path = vec![key.clone()];
    let mut owner = in_flight.owners.get(key).copied();
    // Bounded by the number of in-flight beans; each hop visits a distinct owner.
    for _ in 0..=in_flight.owners.len() {
      match owner {
        Some(thread) if thread == me => {
          let mut chain = Vec::with_capacity(path.len() + 1);
          if let Some(held) = path.last() {
            chain.push(held.bean.clone());
          }
          chain.extend(path.iter().map(|k| k.bean.clone()));
          return Err(BeanError::CircularDependency { chain });
        }
        Some(thread) => match in_flight.waiting.get(&thread) {
          Some(next) => {
            path.push(next.clone());
            owner = in_flight.owners.get(next).copied();
          }
          None => break,
        },
        None => break,
      }
    }

    in_flight.waiting.insert(me, key.clone());
    Ok(Self { thread: me })
  }
}

impl Drop for WaitGuard {
  fn drop(&mut self) {
    IN_FLIGHT.lock().waiting.remove(&self.thread);
  }
}

/// Marks the current thread as the one building the singleton `key` until dropped.
pub(crate) struct OwnerGuard {
  key: ConstructionKey,
}

impl OwnerGuard {
  pub(crate) fn claim(key: ConstructionKey) -> Self {
    let me = thread::current().id();
    let mut in_flight = IN_FLIGHT.lock();
    in_flight.waiting.remove(&me);
    in_flight.owners.insert(key.clone(), me);
    Self { key }
  }
}

impl Drop for OwnerGuard {
  fn drop(&mut self) {
    IN_FLIGHT.lock().owners.remove(&self.key);
  }
}

/// A type a bean can be looked up as.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey {
  pub(crate) type_id: TypeId,
  pub(crate) type_name: &'static str,
}

impl TypeKey {
  pub(crate) fn of<T: ?Sized + Any>() -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: type_name::<T>(),
    }
  }
}

impl fmt::Debug for TypeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeKey({})", self.type_name)
  }
}

type CastFn = Arc<dyn Fn(&BeanValue) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Turns the erased bean value into a boxed `Arc<X>` for one exposed type `X`.
#[derive(Clone)]
pub(crate) struct TypeBinding {
  pub(crate) key: TypeKey,
  cast: CastFn,
}

impl TypeBinding {
  /// The binding of the bean's own concrete type.
  pub(crate) fn concrete<T: Any + Send + Sync>() -> Self {
    Self {
      key: TypeKey::of::<T>(),
      cast: Arc::new(|value: &BeanValue| {
        value
          .clone()
          .downcast::<T>()
          .ok()
          .map(|arc| Box::new(arc) as Box<dyn Any + Send + Sync>)
      }),
    }
  }

  /// A binding exposing the bean as `I`, usually a trait object it implements.
  pub(crate) fn exposed<T, I, F>(upcast: F) -> Self
  where
    T: Any + Send + Sync,
    I: ?Sized + Any + Send + Sync,
    F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
  {
    Self {
      key: TypeKey::of::<I>(),
      cast: Arc::new(move |value: &BeanValue| {
        value
          .clone()
          .downcast::<T>()
          .ok()
          .map(|arc| Box::new(upcast(arc)) as Box<dyn Any + Send + Sync>)
      }),
    }
  }

  pub(crate) fn apply<X: ?Sized + Any + Send + Sync>(&self, value: &BeanValue) -> Option<Arc<X>> {
    (self.cast)(value)
      .and_then(|boxed| boxed.downcast::<Arc<X>>().ok())
      .map(|arc_in_a_box| *arc_in_a_box)
  }
}

impl fmt::Debug for TypeBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.key.fmt(f)
  }
}

/// Finds the binding for `X` and casts the value through it.
pub(crate) fn cast_value<X: ?Sized + Any + Send + Sync>(
  bean: &str,
  bindings: &[TypeBinding],
  value: &BeanValue,
) -> Result<Arc<X>> {
  let wanted = TypeId::of::<X>();
  bindings
    .iter()
    .find(|binding| binding.key.type_id == wanted)
    .and_then(|binding| binding.apply::<X>(value))
    .ok_or_else(|| BeanError::TypeMismatch {
      bean: bean.to_owned(),
      expected: type_name::<X>(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(bean: &str) -> ConstructionKey {
    ConstructionKey {
      registry: 7,
      bean: bean.to_owned(),
    }
  }

  #[test]
  fn guard_reports_the_cycle_in_entry_order() {
    let _a = ConstructionGuard::enter(key("a")).unwrap();
    let _b = ConstructionGuard::enter(key("b")).unwrap();
    match ConstructionGuard::enter(key("a")) {
      Err(BeanError::CircularDependency { chain }) => assert_eq!(chain, ["a", "b", "a"]),
      other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
  }

  #[test]
  fn guard_pops_on_drop() {
    {
      let _a = ConstructionGuard::enter(key("solo")).unwrap();
    }
    assert!(ConstructionGuard::enter(key("solo")).is_ok());
  }

  #[test]
  fn same_name_in_another_registry_is_not_a_cycle() {
    let _a = ConstructionGuard::enter(key("shared")).unwrap();
    let other = ConstructionKey {
      registry: 8,
      bean: "shared".to_owned(),
    };
    assert!(ConstructionGuard::enter(other).is_ok());
  }

  #[test]
  fn waiting_on_a_bean_held_by_a_thread_waiting_on_us_is_a_cycle() {
    let held = ConstructionKey {
      registry: u64::MAX,
      bean: "held".to_owned(),
    };
    let wanted = ConstructionKey {
      registry: u64::MAX,
      bean: "wanted".to_owned(),
    };
    let _mine = OwnerGuard::claim(held.clone());

    let (claimed_tx, claimed_rx) = std::sync::mpsc::channel();
    let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
    let other = thread::spawn(move || {
      let _theirs = OwnerGuard::claim(wanted);
      let _waiting = WaitGuard::enter(&held).unwrap();
      claimed_tx.send(()).unwrap();
      done_rx.recv().unwrap();
    });
    claimed_rx.recv().unwrap();

    let wanted = ConstructionKey {
      registry: u64::MAX,
      bean: "wanted".to_owned(),
    };
    match WaitGuard::enter(&wanted) {
      Err(BeanError::CircularDependency { chain }) => assert_eq!(chain, ["held", "wanted", "held"]),
      other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
    }
    done_tx.send(()).unwrap();
    other.join().unwrap();
  }

  trait Named: Send + Sync {
    fn name(&self) -> &str;
  }
  struct Widget;
  impl Named for Widget {
    fn name(&self) -> &str {
      "widget"
    }
  }

  #[test]
  fn bindings_cast_to_concrete_and_exposed_types() {
    let value: BeanValue = Arc::new(Widget);
    let bindings = vec![
      TypeBinding::concrete::<Widget>(),
      TypeBinding::exposed::<Widget, dyn Named, _>(|w| w as Arc<dyn Named>),
    ];

    let concrete = cast_value::<Widget>("w", &bindings, &value).unwrap();
    let exposed = cast_value::<dyn Named>("w", &bindings, &value).unwrap();
    assert_eq!(exposed.name(), "widget");
    assert_eq!(
      Arc::as_ptr(&concrete) as *const (),
      Arc::as_ptr(&exposed) as *const ()
    );

    assert!(matches!(
      cast_value::<String>("w", &bindings, &value),
      Err(BeanError::TypeMismatch { .. })
    ));
  }
}
