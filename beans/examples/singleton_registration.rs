use fibre_beans::{BoxError, Container};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

struct UserFactory {
  prefix: &'static str,
}

fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::named("singleton-demo");
  container.start()?;

  // Built outside the container; registering it only makes it available for lookup.
  let user_factory = Arc::new(UserFactory { prefix: "user-" });
  container.register_singleton("userFactory", user_factory.clone())?;

  let by_lookup = container.get_by_name::<UserFactory>("userFactory")?;
  println!("user_factory == by_lookup : {}", Arc::ptr_eq(&user_factory, &by_lookup));
  println!("prefix : {}", by_lookup.prefix);

  container.stop()?;
  Ok(())
}
