//! Public macros for ergonomic bean resolution.

/// Resolves a bean from a container, panicking if it cannot be resolved.
///
/// Meant for application wiring code where a missing bean is a programming error. For
/// a non-panicking version, call [`Container::get_by_type`](crate::Container::get_by_type)
/// directly.
///
/// # Panics
///
/// Panics with the underlying [`BeanError`](crate::BeanError) if resolution fails.
///
/// # Examples
///
/// ```
/// use fibre_beans::{resolve, Container};
///
/// let container = Container::new();
/// container.add_singleton("greeting", || String::from("hello")).unwrap();
///
/// let message = resolve!(container, String);
/// assert_eq!(*message, "hello");
/// let named = resolve!(container, String, "greeting");
/// assert_eq!(*named, "hello");
/// ```
///
/// ```
/// use fibre_beans::{resolve, BeanDefinition, Container};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let container = Container::new();
/// container
///   .register(
///     BeanDefinition::builder::<EnglishGreeter>("english")
///       .supplier(|| EnglishGreeter)
///       .expose::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
///       .build()
///       .unwrap(),
///   )
///   .unwrap();
///
/// let greeter = resolve!(container, trait Greeter);
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // resolve!(container, trait MyTrait)
    ($container:expr, trait $trait_ident:ident) => {
        $container
            .get_by_type::<dyn $trait_ident>(None)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required bean {}: {}",
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    // resolve!(container, trait MyTrait, "name")
    ($container:expr, trait $trait_ident:ident, $name:expr) => {
        $container
            .get_by_type::<dyn $trait_ident>(Some($name))
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required bean '{}' as {}: {}",
                    $name,
                    std::any::type_name::<dyn $trait_ident>(),
                    err
                )
            })
    };

    // resolve!(container, MyBean)
    ($container:expr, $type:ty) => {
        $container
            .get_by_type::<$type>(None)
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required bean {}: {}",
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };

    // resolve!(container, MyBean, "name")
    ($container:expr, $type:ty, $name:expr) => {
        $container
            .get_by_type::<$type>(Some($name))
            .unwrap_or_else(|err| {
                panic!(
                    "Failed to resolve required bean '{}' as {}: {}",
                    $name,
                    std::any::type_name::<$type>(),
                    err
                )
            })
    };
}
