use fibre_beans::{BeanDefinition, BoxError, Container, DisposableBean, InitializingBean};
use tracing_subscriber::EnvFilter;

// A factory that logs every lifecycle phase it goes through.
trait UserFactory: Send + Sync {
  fn create_user(&self, name: &str) -> String;
}

struct DefaultUserFactory;

impl DefaultUserFactory {
  fn init(&self) -> Result<(), BoxError> {
    println!("post-construct: UserFactory initializing...");
    Ok(())
  }

  fn init_user_factory(&self) -> Result<(), BoxError> {
    println!("init method init_user_factory(): UserFactory initializing...");
    Ok(())
  }

  fn pre_destroy(&self) -> Result<(), BoxError> {
    println!("pre-destroy: UserFactory destroying...");
    Ok(())
  }

  fn do_destroy(&self) -> Result<(), BoxError> {
    println!("destroy method do_destroy(): UserFactory destroying...");
    Ok(())
  }
}

impl UserFactory for DefaultUserFactory {
  fn create_user(&self, name: &str) -> String {
    format!("User {{ name: {} }}", name)
  }
}

impl InitializingBean for DefaultUserFactory {
  fn after_properties_set(&self) -> Result<(), BoxError> {
    println!("InitializingBean::after_properties_set(): UserFactory initializing...");
    Ok(())
  }
}

impl DisposableBean for DefaultUserFactory {
  fn destroy(&self) -> Result<(), BoxError> {
    println!("DisposableBean::destroy(): UserFactory destroying...");
    Ok(())
  }
}

fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::named("initialization-demo");
  container.register(
    BeanDefinition::builder::<DefaultUserFactory>("userFactory")
      .supplier(|| DefaultUserFactory)
      .expose::<dyn UserFactory>(|f| f as std::sync::Arc<dyn UserFactory>)
      .post_construct(DefaultUserFactory::init)
      .initializing_bean()
      .init_method("init_user_factory", DefaultUserFactory::init_user_factory)
      .pre_destroy(DefaultUserFactory::pre_destroy)
      .disposable_bean()
      .destroy_method("do_destroy", DefaultUserFactory::do_destroy)
      .lazy(false)
      .build()?,
  )?;

  // Non-lazy singletons are initialized while the container starts.
  container.start()?;
  println!("Container started...");

  let user_factory = container.get_by_type::<dyn UserFactory>(None)?;
  println!("{}", user_factory.create_user("mercyblitz"));

  println!("Container stopping...");
  container.stop()?;
  println!("Container stopped...");
  Ok(())
}
