use fibre_beans::{BeanDefinition, BeanError, Container, DependencyRef, LifecycleState, Lookup};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// --- Test Fixtures ---

// The trait must be Send + Sync for the container to accept it.
trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

struct EnglishGreeter;
impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

struct SpanishGreeter;
impl Greeter for SpanishGreeter {
  fn greet(&self) -> String {
    "Hola!".to_string()
  }
}

#[derive(Debug, PartialEq, Eq)]
struct SimpleService {
  id: u32,
}

fn greeter<G: Greeter + 'static>(name: &str, make: fn() -> G) -> BeanDefinition {
  BeanDefinition::builder::<G>(name)
    .supplier(make)
    .expose::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
    .build()
    .unwrap()
}

// --- Basic Tests ---

#[test]
fn test_singleton_is_shared() {
  // Arrange
  let container = Container::new();
  container.add_singleton("simple", || SimpleService { id: 101 }).unwrap();

  // Act
  let r1 = container.get_by_type::<SimpleService>(None).unwrap();
  let r2 = container.get_by_name::<SimpleService>("simple").unwrap();

  // Assert
  assert_eq!(r1.id, 101);
  assert!(Arc::ptr_eq(&r1, &r2));
}

#[test]
fn test_prototype_is_fresh_every_time() {
  // Arrange
  let counter = Arc::new(AtomicUsize::new(0));
  let container = Container::new();
  let c = counter.clone();
  container
    .add_prototype("proto", move || SimpleService {
      id: c.fetch_add(1, Ordering::SeqCst) as u32,
    })
    .unwrap();

  // Act
  let r1 = container.get_by_name::<SimpleService>("proto").unwrap();
  let r2 = container.get_by_name::<SimpleService>("proto").unwrap();

  // Assert
  assert_eq!(r1.id, 0);
  assert_eq!(r2.id, 1);
  assert!(!Arc::ptr_eq(&r1, &r2));
  assert_eq!(container.bean_state("proto"), None);
}

#[test]
fn test_registered_singleton_is_returned_as_is() {
  // Arrange
  let instance = Arc::new(SimpleService { id: 202 });
  let container = Container::new();
  container.register_singleton("manual", instance.clone()).unwrap();

  // Act
  let resolved = container.get_by_name::<SimpleService>("manual").unwrap();

  // Assert
  assert!(Arc::ptr_eq(&instance, &resolved));
  assert_eq!(container.bean_state("manual"), Some(LifecycleState::Ready));
}

#[test]
fn test_trait_lookup_by_name_and_type() {
  // Arrange
  let container = Container::new();
  container.register(greeter("english", || EnglishGreeter)).unwrap();

  // Act
  let by_type = container.get_by_type::<dyn Greeter>(None).unwrap();
  let by_name = container.get_by_name::<dyn Greeter>("english").unwrap();
  let concrete = container.get_by_name::<EnglishGreeter>("english").unwrap();

  // Assert
  assert_eq!(by_type.greet(), "Hello!");
  assert_eq!(by_name.greet(), "Hello!");
  assert_eq!(concrete.greet(), "Hello!");
}

#[test]
fn test_duplicate_name_is_rejected() {
  // Arrange
  let container = Container::named("dupes");
  container.add_singleton("bean", || SimpleService { id: 1 }).unwrap();

  // Act
  let err = container
    .add_singleton("bean", || SimpleService { id: 2 })
    .unwrap_err();

  // Assert
  assert!(matches!(
    err,
    BeanError::DuplicateName { ref name, ref registry } if name == "bean" && registry == "dupes"
  ));
  assert_eq!(container.get_by_name::<SimpleService>("bean").unwrap().id, 1);
}

#[test]
fn test_missing_bean_is_not_found() {
  let container = Container::new();

  let by_name = container.get_by_name::<SimpleService>("nobody").unwrap_err();
  let by_type = container.get_by_type::<SimpleService>(None).unwrap_err();

  assert!(matches!(by_name, BeanError::NotFound(Lookup::Name(ref n)) if n == "nobody"));
  assert!(matches!(by_type, BeanError::NotFound(Lookup::Type { name: None, .. })));
}

#[test]
fn test_wrong_type_is_a_mismatch() {
  let container = Container::new();
  container.add_singleton("simple", || SimpleService { id: 3 }).unwrap();

  let err = container.get_by_name::<String>("simple").unwrap_err();

  assert!(matches!(err, BeanError::TypeMismatch { ref bean, .. } if bean == "simple"));
}

#[test]
fn test_ambiguous_type_lookup_lists_candidates() {
  // Arrange
  let container = Container::new();
  container.register(greeter("english", || EnglishGreeter)).unwrap();
  container.register(greeter("spanish", || SpanishGreeter)).unwrap();

  // Act
  let err = container.get_by_type::<dyn Greeter>(None).err().unwrap();
  let named = container.get_by_type::<dyn Greeter>(Some("spanish")).unwrap();

  // Assert
  match err {
    BeanError::AmbiguousBean { candidates, .. } => {
      assert_eq!(candidates, vec!["english", "spanish"])
    }
    other => panic!("unexpected error: {}", other),
  }
  assert_eq!(named.greet(), "Hola!");
}

#[test]
fn test_primary_resolves_ambiguity() {
  let container = Container::new();
  container.register(greeter("english", || EnglishGreeter)).unwrap();
  container
    .register(
      BeanDefinition::builder::<SpanishGreeter>("spanish")
        .supplier(|| SpanishGreeter)
        .expose::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
        .primary()
        .build()
        .unwrap(),
    )
    .unwrap();

  assert_eq!(container.get_by_type::<dyn Greeter>(None).unwrap().greet(), "Hola!");
}

#[test]
fn test_get_if_available_uses_default_only_when_missing() {
  // Arrange
  let container = Container::new();

  // Act
  let fallback = container
    .get_if_available::<SimpleService, _>(|| Arc::new(SimpleService { id: 0 }))
    .unwrap();
  container.add_singleton("simple", || SimpleService { id: 7 }).unwrap();
  let found = container
    .get_if_available::<SimpleService, _>(|| Arc::new(SimpleService { id: 0 }))
    .unwrap();

  // Assert
  assert_eq!(fallback.id, 0);
  assert_eq!(found.id, 7);
}

#[test]
fn test_get_if_available_still_reports_ambiguity() {
  let container = Container::new();
  container.register(greeter("english", || EnglishGreeter)).unwrap();
  container.register(greeter("spanish", || SpanishGreeter)).unwrap();

  let result = container.get_if_available::<dyn Greeter, _>(|| Arc::new(EnglishGreeter));

  assert!(matches!(result, Err(BeanError::AmbiguousBean { .. })));
}

#[test]
fn test_constructor_receives_dependencies_in_order() {
  // Arrange
  let container = Container::new();
  container.add_singleton("host", || String::from("localhost")).unwrap();
  container.add_singleton("port", || 5432u16).unwrap();
  container
    .register(
      BeanDefinition::builder::<String>("url")
        .depends_on(DependencyRef::name("host"))
        .depends_on(DependencyRef::of::<u16>())
        .constructor(|deps| {
          let host = deps.get::<String>(0)?;
          let port = deps.get::<u16>(1)?;
          Ok(format!("postgres://{}:{}", host, port))
        })
        .build()
        .unwrap(),
    )
    .unwrap();

  // Act
  let url = container.get_by_name::<String>("url").unwrap();

  // Assert
  assert_eq!(*url, "postgres://localhost:5432");
}

#[test]
fn test_contains_does_not_instantiate() {
  let container = Container::new();
  container.add_singleton("simple", || SimpleService { id: 1 }).unwrap();

  assert!(container.contains("simple"));
  assert!(container.contains_local("simple"));
  assert!(!container.contains("other"));
  assert_eq!(container.bean_state("simple"), None);
}
