use std::{
    any::{type_name, TypeId},
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use assembler_aop::{AspectRegistry, Weaver};
use assembler_config::{Configuration, Globals};
use futures::{future::BoxFuture, FutureExt};
use futures_channel::mpsc;
use serde_json::Value;

use crate::{
    definition::{Definition, Engagement, Injection, Use},
    dependency_graph::DependencyGraph,
    errors::{LifecycleError, RegisterError, RequireError},
    events::{EventBus, ListenerId},
    injectable::DynInjectable,
    registry::Registry,
    scheduler::{self, Phase, Schedule},
    types::{Injected, Instance, TypeInfo},
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolution context of one assembled application.
///
/// Holds the registry of components, named objects, event channels and the
/// lifecycle state. Cloning is cheap, clones share the same context.
#[derive(Clone)]
pub struct AssemblerContext(Arc<ContextInner>);

struct ContextInner {
    registry: Mutex<Registry>,
    graph: Mutex<DependencyGraph>,
    objects: Mutex<HashMap<String, Instance>>,
    events: EventBus,
    globals: Globals,
    weaver: Weaver,
    schedule: Mutex<Schedule>,
    /// Identifiers whose declarations are being registered, outermost first
    registering: Mutex<Vec<TypeInfo>>,
    /// Identifiers being constructed, outermost first
    constructing: Mutex<Vec<TypeInfo>>,
}

impl PartialEq for AssemblerContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for AssemblerContext {}

impl fmt::Debug for AssemblerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblerContext")
            .field("phase", &self.phase())
            .field("graph", &*lock(&self.0.graph))
            .field("events", &self.0.events)
            .finish()
    }
}

/// Pops its entry from a construction or registration stack when dropped
pub(crate) struct StackGuard<'a> {
    stack: &'a Mutex<Vec<TypeInfo>>,
    depth: usize,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        lock(self.stack).truncate(self.depth);
    }
}

fn enter<'a>(stack: &'a Mutex<Vec<TypeInfo>>, info: TypeInfo) -> Result<StackGuard<'a>, Vec<TypeInfo>> {
    let mut entries = lock(stack);
    if entries.contains(&info) {
        let mut chain = entries.clone();
        chain.push(info);
        return Err(chain);
    }

    entries.push(info);
    Ok(StackGuard {
        stack,
        depth: entries.len() - 1,
    })
}

impl AssemblerContext {
    pub fn new(aspects: AspectRegistry, globals: Globals) -> Self {
        Self(Arc::new(ContextInner {
            registry: Mutex::default(),
            graph: Mutex::default(),
            objects: Mutex::default(),
            events: EventBus::default(),
            globals,
            weaver: Weaver::new(aspects),
            schedule: Mutex::default(),
            registering: Mutex::default(),
            constructing: Mutex::default(),
        }))
    }

    pub fn aspects(&self) -> &AspectRegistry {
        self.0.weaver.aspects()
    }

    pub fn globals(&self) -> &Globals {
        &self.0.globals
    }

    pub fn global(&self, key: &str) -> Option<Value> {
        self.0.globals.get(key)
    }

    pub fn phase(&self) -> Phase {
        lock(&self.0.schedule).phase
    }

    /// Whether something is registered under the identifier `T`
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        lock(&self.0.registry).contains(&TypeId::of::<T>())
    }

    pub fn has_object(&self, name: &str) -> bool {
        lock(&self.0.objects).contains_key(name)
    }

    /// Concrete component registered under the identifier `T`
    pub fn concrete<T: ?Sized + 'static>(&self) -> Option<TypeInfo> {
        self.injectable(&TypeInfo::of::<T>())
            .map(|injectable| injectable.concrete())
    }

    pub fn definition<T: ?Sized + 'static>(&self) -> Option<Definition> {
        self.injectable(&TypeInfo::of::<T>())
            .map(|injectable| injectable.definition().clone())
    }

    pub fn is_singleton<T: ?Sized + 'static>(&self) -> Option<bool> {
        self.injectable(&TypeInfo::of::<T>())
            .map(|injectable| injectable.is_singleton())
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        lock(&self.0.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the declared dependencies of every registered component
    pub fn graph(&self) -> DependencyGraph {
        lock(&self.0.graph).clone()
    }

    /// Registers a component and its declared dependencies.
    ///
    /// Assembling registers the declared tree on its own. This is public for late
    /// registration into a ready context: singletons registered after the context
    /// finished initializing are initialized as soon as they are first built.
    pub async fn register(&self, injection: Injection) -> Result<(), RegisterError> {
        self.register_tree(injection).await
    }

    /// Returns the instance registered under `T`, building it if needed
    pub async fn require<T: Injected + ?Sized>(&self) -> Result<Arc<T>, RequireError> {
        let instance = self.require_instance(TypeInfo::of::<T>(), None).await?;
        downcast::<T>(&instance)
    }

    /// Like [`AssemblerContext::require`], with a configuration overriding the declared one.
    /// Ignored if `T` is a singleton which is already built
    pub async fn require_with<T: Injected + ?Sized>(
        &self,
        configuration: Configuration,
    ) -> Result<Arc<T>, RequireError> {
        let instance = self
            .require_instance(TypeInfo::of::<T>(), Some(configuration))
            .await?;
        downcast::<T>(&instance)
    }

    /// Named object bound with [`Definition::using`]
    pub fn object<T: Injected + ?Sized>(&self, name: &str) -> Result<Arc<T>, RequireError> {
        let instance = lock(&self.0.objects)
            .get(name)
            .cloned()
            .ok_or_else(|| RequireError::ObjectNotRegistered(name.to_string()))?;
        downcast::<T>(&instance)
    }

    /// Instances of every component carrying any of `tags`, in registration order
    pub async fn tagged(&self, tags: &[&str]) -> Result<Vec<Instance>, RequireError> {
        let matching: Vec<_> = lock(&self.0.registry)
            .iter()
            .filter(|injectable| tags.iter().any(|tag| injectable.definition().has_tag(tag)))
            .cloned()
            .collect();

        let mut instances = Vec::with_capacity(matching.len());
        for injectable in matching {
            instances.push(injectable.build(self, None).await?);
        }
        Ok(instances)
    }

    /// Listens on a declared event channel, returns `None` if nobody declares it
    pub fn on<F>(&self, channel: &str, listener: F) -> Option<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.0.events.listen(channel, Arc::new(listener), false)
    }

    /// Like [`AssemblerContext::on`], removed after the first event
    pub fn once<F>(&self, channel: &str, listener: F) -> Option<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.0.events.listen(channel, Arc::new(listener), true)
    }

    pub fn off(&self, channel: &str, listener: ListenerId) -> bool {
        self.0.events.remove(channel, listener)
    }

    /// Delivers `args` to the listeners of `channel`, returns how many received it
    pub fn emit(&self, channel: &str, args: &[Value]) -> usize {
        self.0.events.emit(channel, args)
    }

    /// Stream of the arguments emitted on a declared channel.
    /// Ends when the channel closes
    pub fn subscribe(&self, channel: &str) -> Option<mpsc::UnboundedReceiver<Vec<Value>>> {
        self.0.events.subscribe(channel)
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.0.events.is_open(channel)
    }

    /// Runs `on_dispose` on every built singleton, dependents first, then clears
    /// the context. Aspect instances belong to the [`AspectRegistry`] and are skipped.
    ///
    /// Hook errors are logged and do not stop the teardown, the first one is returned.
    pub async fn dispose(&self) -> Result<(), LifecycleError> {
        scheduler::dispose(self).await
    }
}

// Crate internals used while assembling
impl AssemblerContext {
    pub(crate) fn weaver(&self) -> &Weaver {
        &self.0.weaver
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.0.events
    }

    pub(crate) fn schedule_state(&self) -> MutexGuard<'_, Schedule> {
        lock(&self.0.schedule)
    }

    /// Records a built singleton, returns `false` if it missed the initialization pass
    pub(crate) fn schedule(&self, identifier: TypeInfo) -> bool {
        self.schedule_state().schedule(identifier)
    }

    pub(crate) fn injectable(&self, identifier: &TypeInfo) -> Option<Arc<dyn DynInjectable>> {
        lock(&self.0.registry).get(identifier)
    }

    pub(crate) async fn require_instance(
        &self,
        identifier: TypeInfo,
        runtime: Option<Configuration>,
    ) -> Result<Instance, RequireError> {
        if self.phase() == Phase::Disposed {
            return Err(RequireError::Disposed);
        }

        let injectable = self
            .injectable(&identifier)
            .ok_or(RequireError::NotRegistered(identifier.type_name))?;
        injectable.build(self, runtime).await
    }

    pub(crate) fn enter_construction(&self, identifier: TypeInfo) -> Result<StackGuard<'_>, RequireError> {
        enter(&self.0.constructing, identifier).map_err(|chain| {
            RequireError::CircularDependency {
                to: identifier,
                chain,
            }
        })
    }

    fn register_tree(&self, injection: Injection) -> BoxFuture<'_, Result<(), RegisterError>> {
        async move {
            let identifier = injection.identifier();
            if lock(&self.0.graph).contains(&identifier) {
                return Err(RegisterError::Duplicate(identifier));
            }

            let injectable = injection.injectable();
            let definition = injectable.definition().clone();
            {
                let _registering = enter(&self.0.registering, identifier).map_err(|chain| {
                    RegisterError::CircularDependency {
                        from: chain[0],
                        to: identifier,
                        chain,
                    }
                })?;

                for dependency in &definition.inject {
                    self.register_tree(dependency.clone()).await?;
                }
                for (name, object) in &definition.uses {
                    self.bind_object(name, object)?;
                }
                for (key, value) in &definition.globals {
                    self.0.globals.add(key.clone(), value.clone())?;
                }
            }

            lock(&self.0.graph).add(identifier, injectable.concrete(), injectable.dependencies())?;
            lock(&self.0.registry).insert(injectable.clone())?;
            tracing::debug!("Registered {}", identifier);

            injectable.on_register(self).await?;

            for engagement in &definition.engage {
                self.engage(engagement).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn engage(&self, engagement: &Engagement) -> Result<(), RegisterError> {
        let aspect = engagement.aspect();
        if self.injectable(&aspect).is_none() {
            self.register_tree(engagement.injection(self.aspects())).await?;
        }

        if engagement.register(self.clone()).await? {
            tracing::debug!("Engaged aspect {}", aspect);
        }
        Ok(())
    }

    fn bind_object(&self, name: &str, object: &Use) -> Result<(), RegisterError> {
        if self.has_object(name) {
            return Err(RegisterError::DuplicateObject(name.to_string()));
        }

        let instance = object.resolve(self);
        lock(&self.0.objects).insert(name.to_string(), instance);
        Ok(())
    }

    /// Forgets everything registered, breaking reference cycles between instances and the context
    pub(crate) fn clear(&self) {
        lock(&self.0.registry).clear();
        lock(&self.0.graph).clear();
        lock(&self.0.objects).clear();
        self.0.events.clear();
    }
}

fn downcast<T: Injected + ?Sized>(instance: &Instance) -> Result<Arc<T>, RequireError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| RequireError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}
