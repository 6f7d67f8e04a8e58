//! # Fibre Beans
//!
//! A thread-safe bean container for Rust with ordered lifecycle callbacks, hierarchical
//! lookup and lazy providers.
//!
//! ## Core Concepts
//!
//! - **Definition**: the recipe for a bean. It names a construction strategy (constructor,
//!   factory method or an external instance), its dependencies, its scope and its
//!   lifecycle callbacks.
//! - **Registry**: holds definitions and the singletons created from them, and may fall
//!   back to a parent registry.
//! - **Container**: owns a registry and drives it. `start` eagerly creates non-lazy
//!   singletons, `stop` destroys them in reverse creation order.
//! - **Provider**: a deferred handle that resolves beans only when asked.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_beans::{BeanDefinition, Container, DependencyRef};
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct EnglishGreeter {
//!     message: Arc<String>,
//! }
//!
//! impl Greeter for EnglishGreeter {
//!     fn greet(&self) -> String {
//!         self.message.to_string()
//!     }
//! }
//!
//! fn main() -> fibre_beans::Result<()> {
//!     let container = Container::new();
//!     container.add_singleton("greeting_message", || String::from("Hello, World!"))?;
//!
//!     // The constructor receives its dependencies in declaration order.
//!     container.register(
//!         BeanDefinition::builder::<EnglishGreeter>("greeter")
//!             .depends_on(DependencyRef::name("greeting_message"))
//!             .constructor(|deps| Ok(EnglishGreeter { message: deps.get::<String>(0)? }))
//!             .expose::<dyn Greeter>(|g| g as Arc<dyn Greeter>)
//!             .build()?,
//!     )?;
//!
//!     container.start()?;
//!     let greeter = container.get_by_type::<dyn Greeter>(None)?;
//!     assert_eq!(greeter.greet(), "Hello, World!");
//!     container.stop()
//! }
//! ```

mod builder;
mod container;
mod core;
mod definition;
mod error;
mod instantiator;
mod lifecycle;
mod lookup;
mod macros;
mod provider;
mod registry;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use definition::{BeanDefinition, BeanDefinitionBuilder, DependencyRef, FactoryTarget, Scope};
pub use error::{BeanError, BoxError, DestroyFailure, Lookup, Result};
pub use instantiator::Dependencies;
pub use lifecycle::{DisposableBean, InitializingBean, LifecycleState};
pub use provider::{BeanStream, Provider};
pub use registry::BeanRegistry;
