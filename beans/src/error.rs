use std::fmt;

use thiserror::Error;

/// Boxed error returned by user supplied constructors, factories and callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a failed lookup was searching for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
  Name(String),
  Type {
    type_name: &'static str,
    name: Option<String>,
  },
}

impl fmt::Display for Lookup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Lookup::Name(name) => write!(f, "name '{}'", name),
      Lookup::Type {
        type_name,
        name: Some(name),
      } => write!(f, "type {} named '{}'", type_name, name),
      Lookup::Type {
        type_name,
        name: None,
      } => write!(f, "type {}", type_name),
    }
  }
}

/// A destroy callback that failed during teardown.
#[derive(Debug)]
pub struct DestroyFailure {
  pub bean: String,
  pub callback: String,
  pub source: BoxError,
}

impl fmt::Display for DestroyFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} of '{}' failed: {}", self.callback, self.bean, self.source)
  }
}

fn join_failures(failures: &[DestroyFailure]) -> String {
  failures
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// The error type for every container operation.
#[derive(Debug, Error)]
pub enum BeanError {
  #[error("bean '{name}' is already registered in registry '{registry}'")]
  DuplicateName { name: String, registry: String },

  #[error("registry '{parent}' cannot become the parent of '{registry}': it would create a cycle")]
  CyclicHierarchy { registry: String, parent: String },

  #[error("bean '{bean}' depends on {dependency}, which cannot be resolved")]
  UnresolvedDependency { bean: String, dependency: Lookup },

  #[error("circular dependency detected: {}", .chain.join(" -> "))]
  CircularDependency { chain: Vec<String> },

  #[error(
    "expected a single bean of type {type_name} but found {}: {}",
    .candidates.len(),
    .candidates.join(", ")
  )]
  AmbiguousBean {
    type_name: &'static str,
    candidates: Vec<String>,
  },

  #[error("no bean found for {0}")]
  NotFound(Lookup),

  #[error("bean '{bean}' failed during {callback}: {source}")]
  Initialization {
    bean: String,
    callback: String,
    #[source]
    source: BoxError,
  },

  #[error("bean '{bean}' is not of the required type {expected}")]
  TypeMismatch { bean: String, expected: &'static str },

  #[error("bean '{bean}' could not be constructed: {source}")]
  Construction {
    bean: String,
    #[source]
    source: BoxError,
  },

  #[error("invalid definition for bean '{bean}': {reason}")]
  InvalidDefinition { bean: String, reason: String },

  #[error("registry '{registry}' has been closed")]
  Closed { registry: String },

  #[error("container '{container}' is {actual}, expected {expected}")]
  InvalidState {
    container: String,
    expected: &'static str,
    actual: &'static str,
  },

  #[error(
    "{} destroy callback(s) failed during shutdown: {}",
    .failures.len(),
    join_failures(.failures)
  )]
  Shutdown { failures: Vec<DestroyFailure> },
}

impl BeanError {
  /// Returns `true` for lookup misses, the only failure optional lookups recover from.
  pub fn is_not_found(&self) -> bool {
    matches!(self, BeanError::NotFound(_))
  }
}

/// A specialized `Result` type for `fibre_beans` operations.
pub type Result<T, E = BeanError> = std::result::Result<T, E>;
