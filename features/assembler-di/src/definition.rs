use std::{fmt, sync::Arc};

use assembler_aop::{Aspect, AspectError, AspectRegistry, MethodBinding};
use assembler_config::Configuration;
use futures::{future::BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::{
    assemblage::Assemblage,
    context::AssemblerContext,
    injectable::{DynInjectable, Injectable},
    types::{Injected, Instance, TypeInfo},
};

/// Declarative description of a component: how it is shared, what it depends
/// on and how it plugs into the rest of the context.
///
/// ```rust
/// use assembler_di::{Definition, Injection, Use};
/// # struct Database;
/// # struct Logger;
/// # impl assembler_di::Assemblage for Database {
/// #     async fn construct(_: &mut assembler_di::BuildHandle) -> Result<Self, assembler_di::DynError> { Ok(Database) }
/// # }
/// # impl assembler_di::Assemblage for Logger {
/// #     async fn construct(_: &mut assembler_di::BuildHandle) -> Result<Self, assembler_di::DynError> { Ok(Logger) }
/// # }
///
/// let definition = Definition::new()
///     .inject(Injection::of::<Database>())
///     .inject(Injection::of::<Logger>())
///     .using("api_url", Use::value("https://example.com".to_string()))
///     .tags(["service"]);
/// assert!(definition.singleton);
/// ```
#[derive(Clone, Debug)]
pub struct Definition {
    /// Share one instance per context, defaults to `true`
    pub singleton: bool,
    /// Class name used for pointcut matching, defaults to the type's short name
    pub name: Option<String>,
    pub inject: Vec<Injection>,
    pub uses: Vec<(String, Use)>,
    pub tags: Vec<String>,
    /// Event channels opened while an instance is alive
    pub events: Vec<String>,
    pub globals: Vec<(String, Value)>,
    pub engage: Vec<Engagement>,
    /// Explicit method bindings to aspects
    pub bindings: Vec<MethodBinding>,
    pub metadata: Map<String, Value>,
    /// Base configuration, overridden by the injecting side
    pub configuration: Configuration,
}

impl Default for Definition {
    fn default() -> Self {
        Self {
            singleton: true,
            name: None,
            inject: Vec::new(),
            uses: Vec::new(),
            tags: Vec::new(),
            events: Vec::new(),
            globals: Vec::new(),
            engage: Vec::new(),
            bindings: Vec::new(),
            metadata: Map::new(),
            configuration: Configuration::new(),
        }
    }
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Shorthand for `singleton(false)`
    pub fn transient(self) -> Self {
        self.singleton(false)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn inject(mut self, injection: Injection) -> Self {
        self.inject.push(injection);
        self
    }

    pub fn using(mut self, name: impl Into<String>, value: Use) -> Self {
        self.uses.push((name.into(), value));
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events.extend(events.into_iter().map(Into::into));
        self
    }

    pub fn global(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.globals.push((key.into(), value.into()));
        self
    }

    pub fn engage(mut self, engagement: Engagement) -> Self {
        self.engage.push(engagement);
        self
    }

    /// Binds `binding.method` to the advices of an aspect, regardless of pointcuts
    pub fn affect(mut self, binding: MethodBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|own| own == tag)
    }
}

type MakeInjectable = Arc<dyn Fn(&Injection) -> Arc<dyn DynInjectable> + Send + Sync>;

/// A dependency declaration: the identifier it is registered under, the concrete
/// component building it and an optional configuration override.
#[derive(Clone)]
pub struct Injection {
    identifier: TypeInfo,
    concrete: TypeInfo,
    pub(crate) configuration: Option<Configuration>,
    pub(crate) singleton: Option<bool>,
    make: MakeInjectable,
}

impl Injection {
    /// Registers `C` under its own type
    pub fn of<C: Assemblage>() -> Self {
        Self::bind::<C, C>(|concrete| concrete)
    }

    /// Registers `C` under the identifier `A`, usually a trait object:
    /// `Injection::bind::<dyn Greeter, English>(|c| c as Arc<dyn Greeter>)`
    pub fn bind<A: Injected + ?Sized, C: Assemblage>(cast: fn(Arc<C>) -> Arc<A>) -> Self {
        Self {
            identifier: TypeInfo::of::<A>(),
            concrete: TypeInfo::of::<C>(),
            configuration: None,
            singleton: None,
            make: Arc::new(move |injection: &Injection| -> Arc<dyn DynInjectable> {
                Arc::new(Injectable::<A, C>::new(injection, cast))
            }),
        }
    }

    /// Configuration passed to the component, overriding its declared one
    pub fn with_config(mut self, configuration: Configuration) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn identifier(&self) -> TypeInfo {
        self.identifier
    }

    pub fn concrete(&self) -> TypeInfo {
        self.concrete
    }

    /// Registers an instance built elsewhere as the singleton of `C`
    pub(crate) fn prebuilt<C: Assemblage>(instance: Arc<C>) -> Self {
        Self {
            identifier: TypeInfo::of::<C>(),
            concrete: TypeInfo::of::<C>(),
            configuration: None,
            singleton: Some(true),
            make: Arc::new(move |injection: &Injection| -> Arc<dyn DynInjectable> {
                Arc::new(Injectable::<C, C>::prebuilt(
                    injection,
                    |concrete| concrete,
                    instance.clone(),
                ))
            }),
        }
    }

    pub(crate) fn forced_singleton(mut self) -> Self {
        self.singleton = Some(true);
        self
    }

    pub(crate) fn injectable(&self) -> Arc<dyn DynInjectable> {
        (self.make)(self)
    }
}

impl fmt::Debug for Injection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Injection");
        debug.field("identifier", &self.identifier.type_name);
        if self.concrete != self.identifier {
            debug.field("concrete", &self.concrete.type_name);
        }
        debug.field("configuration", &self.configuration).finish()
    }
}

type ObjectFactory = Arc<dyn Fn(&AssemblerContext) -> Instance + Send + Sync>;

/// A named object bound into the context, either a value or a factory run at bind time
#[derive(Clone)]
pub enum Use {
    Value(Instance),
    Factory(ObjectFactory),
}

impl Use {
    pub fn value<T: Injected>(value: T) -> Self {
        Use::Value(Instance::new(Arc::new(value)))
    }

    pub fn shared<T: Injected + ?Sized>(value: Arc<T>) -> Self {
        Use::Value(Instance::new(value))
    }

    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Injected,
        F: Fn(&AssemblerContext) -> T + Send + Sync + 'static,
    {
        Use::Factory(Arc::new(move |context: &AssemblerContext| {
            Instance::new(Arc::new(factory(context)))
        }))
    }

    pub(crate) fn resolve(&self, context: &AssemblerContext) -> Instance {
        match self {
            Use::Value(instance) => instance.clone(),
            Use::Factory(factory) => factory(context),
        }
    }
}

impl fmt::Debug for Use {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Use::Value(instance) => f.debug_tuple("Value").field(instance).finish(),
            Use::Factory(_) => f.write_str("Factory"),
        }
    }
}

type RegisterAspect = fn(AssemblerContext) -> BoxFuture<'static, Result<bool, AspectError>>;
type SharedAspect = fn(&AspectRegistry) -> Option<Injection>;

/// Declares that an aspect takes part in the context of the declaring component.
///
/// The aspect instance is shared through the context's [`AspectRegistry`]: the
/// first context engaging it builds it, later ones require that same instance.
#[derive(Clone)]
pub struct Engagement {
    injection: Injection,
    register: RegisterAspect,
    shared: SharedAspect,
}

impl Engagement {
    pub fn of<A: Assemblage + Aspect>() -> Self {
        Self {
            injection: Injection::of::<A>().forced_singleton(),
            register: register_aspect::<A>,
            shared: shared_aspect::<A>,
        }
    }

    pub fn with_config(mut self, configuration: Configuration) -> Self {
        self.injection = self.injection.with_config(configuration);
        self
    }

    pub fn aspect(&self) -> TypeInfo {
        self.injection.identifier()
    }

    /// Injection registering the aspect, bound to the registry's instance if there is one
    pub(crate) fn injection(&self, aspects: &AspectRegistry) -> Injection {
        match (self.shared)(aspects) {
            Some(shared) => Injection {
                configuration: self.injection.configuration.clone(),
                ..shared
            },
            None => self.injection.clone(),
        }
    }

    pub(crate) fn register(&self, context: AssemblerContext) -> BoxFuture<'static, Result<bool, AspectError>> {
        (self.register)(context)
    }
}

impl fmt::Debug for Engagement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Engagement")
            .field(&self.injection.identifier().type_name)
            .finish()
    }
}

fn shared_aspect<A: Assemblage + Aspect>(aspects: &AspectRegistry) -> Option<Injection> {
    aspects.instance::<A>().map(Injection::prebuilt)
}

fn register_aspect<A: Assemblage + Aspect>(
    context: AssemblerContext,
) -> BoxFuture<'static, Result<bool, AspectError>> {
    async move {
        let aspects = context.aspects().clone();
        aspects
            .register_aspect::<A, _, _>(|| async move {
                context.require::<A>().await.map_err(Into::into)
            })
            .await
    }
    .boxed()
}
