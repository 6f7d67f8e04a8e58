use fibre_beans::{BoxError, Container};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct User {
  id: u64,
  name: String,
}

fn display_contains_local(container: &Container, bean: &str) {
  println!(
    "container [{}] contains local bean [{}] : {}",
    container.name(),
    bean,
    container.contains_local(bean)
  );
}

fn display_contains(container: &Container, bean: &str) {
  println!(
    "container [{}] contains bean [{}] : {}",
    container.name(),
    bean,
    container.contains(bean)
  );
}

fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let parent = Container::named("parent");
  parent.add_singleton("user", || User {
    id: 1,
    name: "mercyblitz".to_string(),
  })?;

  let child = Container::builder().name("child").parent(&parent).build()?;

  display_contains_local(&child, "user");
  display_contains_local(&parent, "user");
  display_contains(&child, "user");
  display_contains(&parent, "user");

  parent.start()?;
  child.start()?;

  let user = child.get_by_name::<User>("user")?;
  println!("found through the child: {:?} (id {}, name {})", user, user.id, user.name);

  child.stop()?;
  parent.stop()?;
  Ok(())
}
