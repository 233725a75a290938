use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use assembler_aop::AspectRegistry;
use assembler_config::{Configuration, Globals};
use assembler_di::{
    AssembleError, Assemblage, Assembler, AssemblerContext, BuildHandle, Definition, DynError,
    Hook, Injection, Phase, RegisterError, RequireError,
};
use futures::executor::block_on;

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record(entry: &str) {
    JOURNAL.with(|journal| journal.borrow_mut().push(entry.to_string()));
}

/// Recorded entries starting with `kind:`, without the prefix
fn journal(kind: &str) -> Vec<String> {
    let prefix = format!("{kind}:");
    JOURNAL.with(|journal| {
        journal
            .borrow()
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    })
}

fn assembler() -> Assembler {
    Assembler::new()
        .with_aspects(AspectRegistry::new())
        .with_globals(Globals::new())
}

macro_rules! recorded_hooks {
    ($name:literal) => {
        async fn on_register(_: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("register:", $name));
            Ok(())
        }

        async fn on_init(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("init:", $name));
            Ok(())
        }

        async fn on_inited(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("inited:", $name));
            Ok(())
        }

        async fn on_dispose(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("dispose:", $name));
            Ok(())
        }
    };
}

struct Child;
impl Assemblage for Child {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        record("construct:Child");
        Ok(Child)
    }

    recorded_hooks!("Child");
}

struct Parent {
    child: Arc<Child>,
}
impl Assemblage for Parent {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Child>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        let child = handle.resolve().await?;
        record("construct:Parent");
        Ok(Parent { child })
    }

    recorded_hooks!("Parent");
}

#[test]
fn hooks_run_dependencies_first_and_dispose_dependents_first() {
    let parent = block_on(assembler().build::<Parent>()).unwrap();

    assert_eq!(journal("register"), ["Child", "Parent"]);
    assert_eq!(journal("construct"), ["Child", "Parent"]);
    assert_eq!(journal("init"), ["Child", "Parent"]);
    assert_eq!(journal("inited"), ["Parent", "Child"]);
    assert_eq!(parent.context().phase(), Phase::Ready);

    block_on(parent.dispose()).unwrap();
    assert_eq!(journal("dispose"), ["Parent", "Child"]);
}

struct First;
impl Assemblage for First {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(First)
    }

    recorded_hooks!("First");
}

struct Second;
impl Assemblage for Second {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Second)
    }

    recorded_hooks!("Second");
}

struct Siblings;
impl Assemblage for Siblings {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<First>())
            .inject(Injection::of::<Second>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        handle.require::<First>().await?;
        handle.require::<Second>().await?;
        Ok(Siblings)
    }

    recorded_hooks!("Siblings");
}

#[test]
fn siblings_are_inited_in_reverse_construction_order() {
    let siblings = block_on(assembler().build::<Siblings>()).unwrap();

    assert_eq!(journal("init"), ["First", "Second", "Siblings"]);
    assert_eq!(journal("inited"), ["Siblings", "Second", "First"]);

    block_on(siblings.dispose()).unwrap();
    assert_eq!(journal("dispose"), ["Siblings", "Second", "First"]);
}

#[test]
fn singletons_are_shared_within_a_context() {
    let parent = block_on(assembler().build::<Parent>()).unwrap();
    let child = block_on(parent.context().require::<Child>()).unwrap();

    assert!(Arc::ptr_eq(&parent.child, &child));
    assert_eq!(journal("construct"), ["Child", "Parent"]);
}

#[test]
fn contexts_do_not_share_singletons() {
    let first = block_on(assembler().build::<Parent>()).unwrap();
    let second = block_on(assembler().build::<Parent>()).unwrap();

    assert!(!Arc::ptr_eq(&first.child, &second.child));
    assert_ne!(first.context(), second.context());
}

struct Counter;
impl Assemblage for Counter {
    fn definition() -> Definition {
        Definition::new().transient()
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Counter)
    }

    recorded_hooks!("Counter");
}

struct UsesCounter;
impl Assemblage for UsesCounter {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Counter>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(UsesCounter)
    }
}

#[test]
fn transients_are_built_and_initialized_on_every_request() {
    let app = block_on(assembler().build::<UsesCounter>()).unwrap();
    let context = app.context();

    let first = block_on(context.require::<Counter>()).unwrap();
    let second = block_on(context.require::<Counter>()).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(journal("init"), ["Counter", "Counter"]);
    assert!(journal("inited").is_empty());

    block_on(app.dispose()).unwrap();
    assert!(journal("dispose").is_empty());
}

#[test]
fn the_entry_is_always_a_singleton() {
    let app = block_on(assembler().build::<Counter>()).unwrap();
    let again = block_on(app.context().require::<Counter>()).unwrap();

    assert!(Arc::ptr_eq(app.instance(), &again));
    assert_eq!(app.context().is_singleton::<Counter>(), Some(true));
}

struct Twice;
impl Assemblage for Twice {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<Child>())
            .inject(Injection::of::<Child>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Twice)
    }
}

#[test]
fn registering_an_identifier_twice_fails() {
    let error = block_on(assembler().build::<Twice>()).unwrap_err();

    assert!(matches!(
        error,
        AssembleError::Register(RegisterError::Duplicate(info)) if info.short_name() == "Child"
    ));
}

struct Ping;
impl Assemblage for Ping {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Pong>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Ping)
    }
}

struct Pong;
impl Assemblage for Pong {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Ping>())
    }

    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Pong)
    }
}

#[test]
fn circular_declarations_are_rejected() {
    let error = block_on(assembler().build::<Ping>()).unwrap_err();

    let AssembleError::Register(RegisterError::CircularDependency { from, to, chain }) = error else {
        panic!("expected a circular dependency, got {error}");
    };
    assert_eq!(from.short_name(), "Ping");
    assert_eq!(to.short_name(), "Ping");
    let names: Vec<_> = chain.iter().map(|info| info.short_name()).collect();
    assert_eq!(names, ["Ping", "Pong", "Ping"]);
}

struct Recursive;
impl Assemblage for Recursive {
    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        handle.require::<Recursive>().await?;
        Ok(Recursive)
    }
}

#[test]
fn requiring_a_component_from_its_own_construction_fails() {
    let error = block_on(assembler().build::<Recursive>()).unwrap_err();

    let AssembleError::Require(RequireError::ConstructionFailed { error, .. }) = error else {
        panic!("expected a construction failure, got {error}");
    };
    assert!(error.to_string().contains("while it is being constructed"));
}

struct Late;
impl Assemblage for Late {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Late)
    }

    recorded_hooks!("Late");
}

#[test]
fn late_singletons_are_initialized_immediately() {
    let parent = block_on(assembler().build::<Parent>()).unwrap();
    let context = parent.context().clone();

    block_on(context.register(Injection::of::<Late>())).unwrap();
    assert_eq!(journal("register"), ["Child", "Parent", "Late"]);
    assert_eq!(journal("init"), ["Child", "Parent"]);

    block_on(context.require::<Late>()).unwrap();
    assert_eq!(journal("init"), ["Child", "Parent", "Late"]);
    assert_eq!(journal("inited"), ["Parent", "Child", "Late"]);

    block_on(parent.dispose()).unwrap();
    assert_eq!(journal("dispose"), ["Late", "Parent", "Child"]);
}

struct FailsInit;
impl Assemblage for FailsInit {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(FailsInit)
    }

    async fn on_init(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
        Err("not ready".into())
    }
}

#[test]
fn failing_init_hooks_abort_the_build() {
    let error = block_on(assembler().build::<FailsInit>()).unwrap_err();

    let AssembleError::Lifecycle(error) = error else {
        panic!("expected a lifecycle error, got {error}");
    };
    assert_eq!(error.hook, Hook::Init);
    assert_eq!(error.error.to_string(), "not ready");
}

struct FailsDispose;
impl Assemblage for FailsDispose {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(FailsDispose)
    }

    async fn on_dispose(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
        record("dispose:FailsDispose");
        Err("still busy".into())
    }
}

struct HoldsFailing;
impl Assemblage for HoldsFailing {
    fn definition() -> Definition {
        Definition::new()
            .inject(Injection::of::<Child>())
            .inject(Injection::of::<FailsDispose>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        handle.require::<Child>().await?;
        handle.require::<FailsDispose>().await?;
        Ok(HoldsFailing)
    }

    recorded_hooks!("HoldsFailing");
}

#[test]
fn dispose_continues_past_failing_hooks() {
    let app = block_on(assembler().build::<HoldsFailing>()).unwrap();
    let context = app.context().clone();

    let error = block_on(app.dispose()).unwrap_err();
    assert_eq!(error.hook, Hook::Dispose);
    assert_eq!(journal("dispose"), ["HoldsFailing", "FailsDispose", "Child"]);

    assert_eq!(context.phase(), Phase::Disposed);
    assert!(context.is_empty());
    assert!(matches!(
        block_on(context.require::<Child>()),
        Err(RequireError::Disposed)
    ));

    // Disposing twice is a no-op
    block_on(context.dispose()).unwrap();
    assert_eq!(journal("dispose").len(), 3);
}

struct SelfDisposing {
    disposer: assembler_di::Disposer,
}
impl Assemblage for SelfDisposing {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Child>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        handle.require::<Child>().await?;
        Ok(SelfDisposing {
            disposer: handle.resolve().await?,
        })
    }
}

#[test]
fn components_can_dispose_their_context() {
    let app = block_on(assembler().build::<SelfDisposing>()).unwrap();

    block_on(app.disposer.dispose()).unwrap();
    assert_eq!(journal("dispose"), ["Child"]);
    assert_eq!(app.context().phase(), Phase::Disposed);
}

/// Completes after being polled `remaining + 1` times, waking itself in between
struct Yield {
    remaining: usize,
}
impl Future for Yield {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.remaining == 0 {
            return Poll::Ready(());
        }
        self.remaining -= 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

macro_rules! yielding_hooks {
    ($name:literal) => {
        async fn on_init(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("init:", $name, " started"));
            Yield { remaining: 2 }.await;
            record(concat!("init:", $name, " finished"));
            Ok(())
        }

        async fn on_inited(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("inited:", $name, " started"));
            Yield { remaining: 2 }.await;
            record(concat!("inited:", $name, " finished"));
            Ok(())
        }

        async fn on_dispose(&self, _: &AssemblerContext, _: &Configuration) -> Result<(), DynError> {
            record(concat!("dispose:", $name, " started"));
            Yield { remaining: 2 }.await;
            record(concat!("dispose:", $name, " finished"));
            Ok(())
        }
    };
}

struct Sluggish;
impl Assemblage for Sluggish {
    async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Sluggish)
    }

    yielding_hooks!("Sluggish");
}

struct Drowsy {
    _sluggish: Arc<Sluggish>,
}
impl Assemblage for Drowsy {
    fn definition() -> Definition {
        Definition::new().inject(Injection::of::<Sluggish>())
    }

    async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
        Ok(Drowsy {
            _sluggish: handle.resolve().await?,
        })
    }

    yielding_hooks!("Drowsy");
}

#[test]
fn suspending_hooks_finish_before_the_next_one_starts() {
    let drowsy = block_on(assembler().build::<Drowsy>()).unwrap();

    assert_eq!(
        journal("init"),
        ["Sluggish started", "Sluggish finished", "Drowsy started", "Drowsy finished"]
    );
    assert_eq!(
        journal("inited"),
        ["Drowsy started", "Drowsy finished", "Sluggish started", "Sluggish finished"]
    );

    block_on(drowsy.dispose()).unwrap();
    assert_eq!(
        journal("dispose"),
        ["Drowsy started", "Drowsy finished", "Sluggish started", "Sluggish finished"]
    );
}
