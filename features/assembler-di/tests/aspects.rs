use std::{
    cell::Cell,
    sync::{Arc, Mutex},
};

use assembler_aop::{
    AdviceDefinition, AdviceKind, AdviceMethod, Aspect, AspectRegistry, Interceptor, MethodBinding,
};
use assembler_config::{Configuration, Globals};
use assembler_di::{
    Assemblage, Assembler, AssemblerContext, BuildHandle, Definition, DynError, Engagement,
    Injection,
};
use futures::executor::block_on;
use serde_json::{json, Value};

thread_local! {
    static TRACERS_BUILT: Cell<usize> = const { Cell::new(0) };
    static TRACERS_DISPOSED: Cell<usize> = const { Cell::new(0) };
}

fn assembler(aspects: &AspectRegistry) -> Assembler {
    Assembler::new()
        .with_aspects(aspects.clone())
        .with_globals(Globals::new())
}

/// Logs every call into a repository
#[derive(Default)]
struct Tracer {
    calls: Mutex<Vec<String>>,
}
impl Tracer {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}
impl Assemblage for Tracer {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        TRACERS_BUILT.with(|built| built.set(built.get() + 1));
        Ok(Tracer::default())
    }

    async fn on_dispose(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
        TRACERS_DISPOSED.with(|disposed| disposed.set(disposed.get() + 1));
        Ok(())
    }
}
impl Aspect for Tracer {
    fn advices() -> Vec<AdviceDefinition> {
        vec![AdviceDefinition::before("execution(*Repository.*)", "trace")]
    }

    fn advice_method(self: Arc<Self>, method: &str) -> Option<AdviceMethod> {
        match method {
            "trace" => Some(AdviceMethod::observe(move |join_point| {
                let tracer = self.clone();
                async move {
                    let args: Vec<_> = join_point.args.iter().map(Value::to_string).collect();
                    tracer.calls.lock().unwrap().push(format!(
                        "{}.{}({})",
                        join_point.target,
                        join_point.method,
                        args.join(", ")
                    ));
                    Ok(())
                }
            })),
            _ => None,
        }
    }
}

struct OrderRepository {
    interceptor: Interceptor,
}
impl OrderRepository {
    async fn save(&self, order: &str) -> Result<Value, DynError> {
        let order = json!(order);
        self.interceptor
            .invoke("save", vec![order], |args| async move {
                Ok(json!({ "saved": args[0] }))
            })
            .await
    }

    async fn delete(&self, order: &str) -> Result<Value, DynError> {
        self.interceptor
            .invoke("delete", vec![json!(order)], |_| async { Ok(json!(true)) })
            .await
    }
}
impl Assemblage for OrderRepository {
    fn definition() -> Definition {
        Definition::new().affect(
            MethodBinding::new::<Guard>("delete")
                .role("confirm")
                .with_config(Configuration::new().with("allowed", false)),
        )
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(OrderRepository {
            interceptor: handle.resolve().await?,
        })
    }

    fn interceptor(&self) -> Option<&Interceptor> {
        Some(&self.interceptor)
    }
}

/// Refuses calls whose binding configuration does not allow them
#[derive(Default)]
struct Guard;
impl Assemblage for Guard {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Guard)
    }
}
impl Aspect for Guard {
    fn advices() -> Vec<AdviceDefinition> {
        vec![
            AdviceDefinition::new(AdviceKind::Around, "confirm").role("confirm"),
            AdviceDefinition::new(AdviceKind::Before, "never").role("other"),
        ]
    }

    fn advice_method(self: Arc<Self>, method: &str) -> Option<AdviceMethod> {
        match method {
            "confirm" => Some(AdviceMethod::around(|join_point, proceed| async move {
                let allowed = join_point
                    .config
                    .as_ref()
                    .and_then(|config| config.value("allowed"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                if !allowed {
                    return Ok(json!("refused"));
                }
                proceed.proceed().await
            })),
            "never" => Some(AdviceMethod::observe(|_| async {
                Err("the other role is never bound".into())
            })),
            _ => None,
        }
    }
}

struct Shop {
    orders: Arc<OrderRepository>,
}
impl Assemblage for Shop {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<OrderRepository>())
            .engage(Engagement::of::<Tracer>())
            .engage(Engagement::of::<Guard>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Shop {
            orders: handle.resolve().await?,
        })
    }
}

#[test]
fn engaged_aspects_advise_components_of_the_context() {
    let aspects = AspectRegistry::new();
    let shop = block_on(assembler(&aspects).build::<Shop>()).unwrap();

    let saved = block_on(shop.orders.save("A-1")).unwrap();
    assert_eq!(saved, json!({ "saved": "A-1" }));

    let tracer = block_on(shop.context().require::<Tracer>()).unwrap();
    assert_eq!(tracer.calls(), ["OrderRepository.save(\"A-1\")"]);
    assert!(Arc::ptr_eq(&tracer, &aspects.instance::<Tracer>().unwrap()));
}

#[test]
fn method_bindings_apply_the_selected_role_with_their_configuration() {
    let aspects = AspectRegistry::new();
    let shop = block_on(assembler(&aspects).build::<Shop>()).unwrap();

    assert_eq!(block_on(shop.orders.delete("A-1")).unwrap(), json!("refused"));
    // Pointcut advices still apply next to the binding
    let tracer = aspects.instance::<Tracer>().unwrap();
    assert_eq!(tracer.calls(), ["OrderRepository.delete(\"A-1\")"]);
}

#[test]
fn aspects_are_shared_between_contexts_until_reset() {
    let aspects = AspectRegistry::new();
    let assembler = assembler(&aspects);

    let first = block_on(assembler.build::<Shop>()).unwrap();
    let second = block_on(assembler.build::<Shop>()).unwrap();
    assert_eq!(TRACERS_BUILT.with(Cell::get), 1);

    block_on(first.orders.save("first")).unwrap();
    block_on(second.orders.save("second")).unwrap();
    let tracer = aspects.instance::<Tracer>().unwrap();
    assert_eq!(
        tracer.calls(),
        ["OrderRepository.save(\"first\")", "OrderRepository.save(\"second\")"]
    );

    aspects.reset();
    let third = block_on(assembler.build::<Shop>()).unwrap();
    assert_eq!(TRACERS_BUILT.with(Cell::get), 2);

    block_on(third.orders.save("third")).unwrap();
    let fresh = aspects.instance::<Tracer>().unwrap();
    assert!(!Arc::ptr_eq(&tracer, &fresh));
    assert_eq!(fresh.calls(), ["OrderRepository.save(\"third\")"]);
    assert_eq!(tracer.calls().len(), 2);
}

#[test]
fn every_context_requires_the_shared_aspect_instance() {
    let aspects = AspectRegistry::new();
    let assembler = assembler(&aspects);
    let first = block_on(assembler.build::<Shop>()).unwrap();
    let second = block_on(assembler.build::<Shop>()).unwrap();

    let shared = aspects.instance::<Tracer>().unwrap();
    let from_first = block_on(first.context().require::<Tracer>()).unwrap();
    let from_second = block_on(second.context().require::<Tracer>()).unwrap();
    assert!(Arc::ptr_eq(&from_first, &shared));
    assert!(Arc::ptr_eq(&from_second, &shared));
    assert_eq!(TRACERS_BUILT.with(Cell::get), 1);

    block_on(second.orders.save("B-1")).unwrap();
    assert_eq!(from_second.calls(), ["OrderRepository.save(\"B-1\")"]);
}

#[test]
fn disposing_a_context_leaves_shared_aspects_to_the_registry() {
    let aspects = AspectRegistry::new();
    let assembler = assembler(&aspects);
    let first = block_on(assembler.build::<Shop>()).unwrap();
    let second = block_on(assembler.build::<Shop>()).unwrap();

    block_on(first.dispose()).unwrap();
    assert_eq!(TRACERS_DISPOSED.with(Cell::get), 0);
    assert!(aspects.contains::<Tracer>());

    block_on(second.orders.save("after")).unwrap();
    let tracer = block_on(second.context().require::<Tracer>()).unwrap();
    assert_eq!(tracer.calls(), ["OrderRepository.save(\"after\")"]);

    block_on(second.dispose()).unwrap();
    assert_eq!(TRACERS_DISPOSED.with(Cell::get), 0);
    assert!(Arc::ptr_eq(&tracer, &aspects.instance::<Tracer>().unwrap()));
}

struct Warehouse;
impl Assemblage for Warehouse {
    fn definition() -> Definition {
        Definition::new().engage(Engagement::of::<Tracer>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Warehouse)
    }
}

struct Store;
impl Assemblage for Store {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<Warehouse>())
            .engage(Engagement::of::<Tracer>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Store)
    }
}

#[test]
fn engaging_an_aspect_twice_registers_it_once() {
    let aspects = AspectRegistry::new();
    let store = block_on(assembler(&aspects).build::<Store>()).unwrap();

    assert_eq!(aspects.len(), 1);
    assert_eq!(TRACERS_BUILT.with(Cell::get), 1);
    assert!(store.context().has::<Tracer>());
}

struct Plain;
impl Assemblage for Plain {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Plain)
    }
}

struct PlainRepository {
    interceptor: Interceptor,
}
impl Assemblage for PlainRepository {
    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(PlainRepository {
            interceptor: handle.interceptor(),
        })
    }

    fn interceptor(&self) -> Option<&Interceptor> {
        Some(&self.interceptor)
    }
}

struct Unadvised {
    repository: Arc<PlainRepository>,
}
impl Assemblage for Unadvised {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<Plain>())
            .inject(Injection::of::<PlainRepository>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        handle.require::<Plain>().await?;
        Ok(Unadvised {
            repository: handle.resolve().await?,
        })
    }
}

#[test]
fn components_are_only_woven_when_an_aspect_applies() {
    let aspects = AspectRegistry::new();
    let unadvised = block_on(assembler(&aspects).build::<Unadvised>()).unwrap();
    assert!(!unadvised.repository.interceptor.is_woven());

    // Tracer's pointcut matches any *Repository
    let shop = block_on(assembler(&aspects).build::<Shop>()).unwrap();
    assert!(shop.orders.interceptor.is_woven());
    assert_eq!(shop.orders.interceptor.target(), "OrderRepository");
}
