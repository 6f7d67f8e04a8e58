use fibre_beans::{BeanDefinition, BoxError, Container};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct User {
  id: u64,
  name: String,
}

impl User {
  fn create_user() -> Arc<User> {
    Arc::new(User {
      id: 1,
      name: "default".to_string(),
    })
  }
}

fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::named("provider-demo");
  container.register(
    BeanDefinition::builder::<String>("helloWorld")
      .supplier(|| "Hello,World".to_string())
      .primary()
      .build()?,
  )?;
  container.add_singleton("message", || "Message".to_string())?;
  container.start()?;

  println!("--------------- lookup by provider -----------");
  let strings = container.get_provider::<String>();
  println!("{}", strings.get()?);

  println!("\n--------------- lookup if available -----------");
  let users = container.get_provider::<User>();
  let user = users.get_if_available()?.unwrap_or_else(User::create_user);
  println!("current user: {:?} (id {}, name {})", user, user.id, user.name);

  println!("\n--------------- lookup by stream -----------");
  for message in &strings {
    println!("{}", message?);
  }

  container.stop()?;
  Ok(())
}
