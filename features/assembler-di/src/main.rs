use std::sync::{Arc, Mutex};

use assembler_aop::{AdviceDefinition, AdviceMethod, Aspect, Interceptor};
use assembler_config::Configuration;
use assembler_di::{Assemblage, Assembler, BuildHandle, Definition, DynError, Engagement, Injection};
use serde_json::{json, Value};

fn main() {
    let assembler = Assembler::new();
    let configuration = Configuration::new().with("greeting", "Hello");

    let app = futures::executor::block_on(assembler.build_with::<App>(Some(configuration))).unwrap();
    println!("{}", app.context().graph());

    let greeting = futures::executor::block_on(app.greeter.greet("world")).unwrap();
    println!("{greeting}");

    let journal = futures::executor::block_on(app.context().require::<Journal>()).unwrap();
    println!("{:?}", journal.entries.lock().unwrap());

    futures::executor::block_on(app.dispose()).unwrap();
}

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> futures::future::BoxFuture<'static, Result<String, DynError>>;
}

struct Polite {
    greeting: String,
    interceptor: Interceptor,
}
impl Assemblage for Polite {
    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Polite {
            greeting: handle.configuration().get("greeting")?.unwrap_or_default(),
            interceptor: handle.interceptor(),
        })
    }

    fn interceptor(&self) -> Option<&Interceptor> {
        Some(&self.interceptor)
    }
}
impl Greeter for Polite {
    fn greet(&self, name: &str) -> futures::future::BoxFuture<'static, Result<String, DynError>> {
        let interceptor = self.interceptor.clone();
        let greeting = self.greeting.clone();
        let args = vec![json!(name)];
        Box::pin(async move {
            let result = interceptor
                .invoke("greet", args, move |args| async move {
                    let name = args[0].as_str().unwrap_or("stranger").to_string();
                    Ok(json!(format!("{greeting}, {name}!")))
                })
                .await?;
            Ok(result.as_str().unwrap_or_default().to_string())
        })
    }
}

#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}
impl Assemblage for Journal {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Journal::default())
    }
}
impl Aspect for Journal {
    fn advices() -> Vec<AdviceDefinition> {
        vec![AdviceDefinition::after("execution(Polite.*)", "record")]
    }

    fn advice_method(self: Arc<Self>, method: &str) -> Option<AdviceMethod> {
        match method {
            "record" => Some(AdviceMethod::observe(move |join_point| {
                let journal = self.clone();
                async move {
                    let result = join_point.result.unwrap_or(Value::Null);
                    journal
                        .entries
                        .lock()
                        .unwrap()
                        .push(format!("{}.{} -> {result}", join_point.target, join_point.method));
                    Ok(())
                }
            })),
            _ => None,
        }
    }
}

struct App {
    greeter: Arc<dyn Greeter>,
}
impl Assemblage for App {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::bind::<dyn Greeter, Polite>(|polite| polite as Arc<dyn Greeter>))
            .engage(Engagement::of::<Journal>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(App {
            greeter: handle.resolve().await?,
        })
    }
}
