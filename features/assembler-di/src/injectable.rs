use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};

use assembler_config::Configuration;
use futures::{future::BoxFuture, FutureExt};

use crate::{
    assemblage::{Assemblage, Hook},
    context::AssemblerContext,
    definition::{Definition, Injection},
    errors::{LifecycleError, RequireError},
    handle::BuildHandle,
    types::{DynError, Injected, Instance, TypeInfo},
};

/// Type erased [`Injectable`], stored in a context's registry
pub(crate) trait DynInjectable: Send + Sync {
    /// Type the component is registered and required under
    fn identifier(&self) -> TypeInfo;

    fn concrete(&self) -> TypeInfo;

    fn definition(&self) -> &Definition;

    fn is_singleton(&self) -> bool;

    /// Declared dependencies, in declaration order
    fn dependencies(&self) -> Vec<TypeInfo>;

    fn on_register<'a>(
        &'a self,
        context: &'a AssemblerContext,
    ) -> BoxFuture<'a, Result<(), LifecycleError>>;

    /// Returns the cached singleton or builds a new instance
    fn build<'a>(
        &'a self,
        context: &'a AssemblerContext,
        runtime: Option<Configuration>,
    ) -> BoxFuture<'a, Result<Instance, RequireError>>;

    /// Runs `on_init` or `on_inited` on the cached singleton
    fn initialize<'a>(
        &'a self,
        hook: Hook,
        context: &'a AssemblerContext,
    ) -> BoxFuture<'a, Result<(), LifecycleError>>;

    /// Runs `on_dispose` on the cached singleton and forgets it
    fn dispose<'a>(&'a self, context: &'a AssemblerContext) -> BoxFuture<'a, Result<(), LifecycleError>>;
}

/// Registry entry building the component `C`, handed out as `A`.
///
/// Singletons are built at most once and cached together with the configuration
/// they were built with, transients are built on every request. Transients open
/// their event channels on the first build; they stay open until the context is
/// disposed.
pub struct Injectable<A: Injected + ?Sized, C: Assemblage> {
    identifier: TypeInfo,
    definition: Definition,
    singleton: bool,
    configuration: Configuration,
    cast: fn(Arc<C>) -> Arc<A>,
    built: Mutex<Option<Arc<Built<C>>>>,
    channels_opened: AtomicBool,
}

struct Built<C> {
    concrete: Arc<C>,
    instance: Instance,
    configuration: Configuration,
}

impl<A: Injected + ?Sized, C: Assemblage> Injectable<A, C> {
    pub(crate) fn new(injection: &Injection, cast: fn(Arc<C>) -> Arc<A>) -> Self {
        let definition = C::definition();
        let configuration = definition
            .configuration
            .merge(injection.configuration.as_ref());
        let singleton = injection.singleton.unwrap_or(definition.singleton);

        Self {
            identifier: injection.identifier(),
            definition,
            singleton,
            configuration,
            cast,
            built: Mutex::new(None),
            channels_opened: AtomicBool::new(false),
        }
    }

    /// A singleton entry for an instance built elsewhere. No hooks run on it in this context.
    pub(crate) fn prebuilt(
        injection: &Injection,
        cast: fn(Arc<C>) -> Arc<A>,
        concrete: Arc<C>,
    ) -> Self {
        let injectable = Self::new(injection, cast);
        *injectable.built.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(Built {
            instance: Instance::new(cast(concrete.clone())),
            concrete,
            configuration: injectable.configuration.clone(),
        }));
        injectable
    }

    /// Class name advices are matched against
    pub fn class_name(&self) -> &str {
        match &self.definition.name {
            Some(name) => name,
            None => TypeInfo::of::<C>().short_name(),
        }
    }

    fn cached(&self) -> Option<Arc<Built<C>>> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn failed(&self, hook: Hook, error: DynError) -> LifecycleError {
        LifecycleError::new(TypeInfo::of::<C>().type_name, hook, error)
    }

    async fn construct(
        &self,
        context: &AssemblerContext,
        runtime: Option<Configuration>,
    ) -> Result<Instance, RequireError> {
        let configuration = self.configuration.merge(runtime.as_ref());
        let component = TypeInfo::of::<C>();

        let guard = context.enter_construction(self.identifier)?;
        let mut handle = BuildHandle::new(
            context.clone(),
            configuration.clone(),
            self.definition.clone(),
            self.class_name().to_string(),
        );
        let concrete = C::construct(&mut handle)
            .await
            .map_err(|error| RequireError::ConstructionFailed {
                component: component.type_name,
                error: Arc::new(error),
            })?;
        drop(guard);

        let concrete = Arc::new(concrete);
        context
            .weaver()
            .weave(self.class_name(), concrete.interceptor(), &self.definition.bindings);
        if self.singleton || !self.channels_opened.swap(true, Ordering::SeqCst) {
            context.events().open(&self.definition.events);
        }

        let instance = Instance::new((self.cast)(concrete.clone()));
        tracing::debug!("Constructed {}", component);

        if !self.singleton {
            concrete
                .on_init(context, &configuration)
                .await
                .map_err(|error| self.failed(Hook::Init, error))?;
            return Ok(instance);
        }

        *self.built.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(Built {
            concrete: concrete.clone(),
            instance: instance.clone(),
            configuration: configuration.clone(),
        }));

        if !context.schedule(self.identifier) {
            // Built after the context finished initializing
            concrete
                .on_init(context, &configuration)
                .await
                .map_err(|error| self.failed(Hook::Init, error))?;
            concrete
                .on_inited(context, &configuration)
                .await
                .map_err(|error| self.failed(Hook::Inited, error))?;
        }

        Ok(instance)
    }
}

impl<A: Injected + ?Sized, C: Assemblage> DynInjectable for Injectable<A, C> {
    fn identifier(&self) -> TypeInfo {
        self.identifier
    }

    fn concrete(&self) -> TypeInfo {
        TypeInfo::of::<C>()
    }

    fn definition(&self) -> &Definition {
        &self.definition
    }

    fn is_singleton(&self) -> bool {
        self.singleton
    }

    fn dependencies(&self) -> Vec<TypeInfo> {
        self.definition
            .inject
            .iter()
            .map(Injection::identifier)
            .collect()
    }

    fn on_register<'a>(
        &'a self,
        context: &'a AssemblerContext,
    ) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            C::on_register(context, &self.configuration)
                .await
                .map_err(|error| self.failed(Hook::Register, error))
        }
        .boxed()
    }

    fn build<'a>(
        &'a self,
        context: &'a AssemblerContext,
        runtime: Option<Configuration>,
    ) -> BoxFuture<'a, Result<Instance, RequireError>> {
        async move {
            if self.singleton {
                if let Some(built) = self.cached() {
                    return Ok(built.instance.clone());
                }
            }
            self.construct(context, runtime).await
        }
        .boxed()
    }

    fn initialize<'a>(
        &'a self,
        hook: Hook,
        context: &'a AssemblerContext,
    ) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            let Some(built) = self.cached() else {
                return Ok(());
            };

            let result = match hook {
                Hook::Init => built.concrete.on_init(context, &built.configuration).await,
                Hook::Inited => built.concrete.on_inited(context, &built.configuration).await,
                Hook::Register | Hook::Dispose => Ok(()),
            };
            result.map_err(|error| self.failed(hook, error))
        }
        .boxed()
    }

    fn dispose<'a>(&'a self, context: &'a AssemblerContext) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            let Some(built) = self.built.lock().unwrap_or_else(PoisonError::into_inner).take() else {
                return Ok(());
            };

            if context.aspects().owns(&built.concrete) {
                tracing::debug!("Leaving shared aspect {} to its registry", self.identifier);
                return Ok(());
            }

            context.events().close(&self.definition.events);
            built
                .concrete
                .on_dispose(context, &built.configuration)
                .await
                .map_err(|error| self.failed(Hook::Dispose, error))
        }
        .boxed()
    }
}
