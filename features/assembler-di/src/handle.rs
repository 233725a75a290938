use std::sync::Arc;

use assembler_aop::Interceptor;
use assembler_config::{Config, Configuration};
use futures::{future::BoxFuture, FutureExt};
use serde::de::DeserializeOwned;

use crate::{
    context::AssemblerContext,
    definition::Definition,
    errors::{InjectError, LifecycleError},
    resolver::Resolver,
    types::Injected,
};

/// Handed to [`Assemblage::construct`](crate::Assemblage::construct), resolves
/// everything a component needs while it is being built
pub struct BuildHandle {
    context: AssemblerContext,
    configuration: Configuration,
    definition: Definition,
    class: String,
}

impl BuildHandle {
    pub(crate) fn new(
        context: AssemblerContext,
        configuration: Configuration,
        definition: Definition,
        class: String,
    ) -> Self {
        Self {
            context,
            configuration,
            definition,
            class,
        }
    }

    /// Resolves anything implementing [`Resolver`], e.g. `Arc<T>`, `Option<Arc<T>>` or `Config<T>`
    pub fn resolve<R: Resolver>(&mut self) -> BoxFuture<'_, Result<R, InjectError>> {
        R::resolve(self)
    }

    pub async fn require<T: Injected + ?Sized>(&mut self) -> Result<Arc<T>, InjectError> {
        Ok(self.context.require::<T>().await?)
    }

    /// Requires `T`, passing it a configuration overriding its declared one
    pub async fn require_with<T: Injected + ?Sized>(
        &mut self,
        configuration: Configuration,
    ) -> Result<Arc<T>, InjectError> {
        Ok(self.context.require_with::<T>(configuration).await?)
    }

    /// Requires `T`, falling back to `default` if it is not registered
    pub fn optional_or<T: Injected + ?Sized>(
        &mut self,
        default: Arc<T>,
    ) -> BoxFuture<'_, Result<Arc<T>, InjectError>> {
        async move {
            match self.require::<T>().await {
                Err(e) if e.is_not_registered() => Ok(default),
                resolved => resolved,
            }
        }
        .boxed()
    }

    /// Named object bound with [`Definition::using`]
    pub fn object<T: Injected + ?Sized>(&self, name: &str) -> Result<Arc<T>, InjectError> {
        Ok(self.context.object::<T>(name)?)
    }

    pub fn context(&self) -> AssemblerContext {
        self.context.clone()
    }

    /// Merged configuration of the instance being built
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn config<T: DeserializeOwned>(&self) -> Result<Config<T>, InjectError> {
        Ok(Config::from_configuration(&self.configuration)?)
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn disposer(&self) -> Disposer {
        Disposer(self.context.clone())
    }

    /// Interceptor for the instance being built, to be returned from
    /// [`Assemblage::interceptor`](crate::Assemblage::interceptor)
    pub fn interceptor(&self) -> Interceptor {
        Interceptor::new(self.class.clone(), self.context.aspects().clone())
    }
}

/// Disposes the context a component was built in
#[derive(Clone, Debug)]
pub struct Disposer(AssemblerContext);

impl Disposer {
    pub async fn dispose(&self) -> Result<(), LifecycleError> {
        self.0.dispose().await
    }
}
